use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    claim_path::{ClaimPath, DisclosureLedger},
    tree::{Disclosability, DisclosableObject, DisclosableValue},
};

/// JWT and VC metadata claims excluded from schema validation at the payload
/// root.
pub const WELL_KNOWN_CLAIMS: &[&str] = &[
    "iss",
    "sub",
    "aud",
    "exp",
    "nbf",
    "iat",
    "jti",
    "vct",
    "vct#integrity",
];

/// Shape expected of a claim value, with values erased.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaValue {
    /// Any JSON value, checked only for disclosability.
    Claim,

    /// An object with a known set of attributes.
    Object(SchemaObject),

    /// An array. Validation requires a uniform element template; see
    /// [`SchemaArray`].
    Array(SchemaArray),
}

/// A tagged node of a definition schema.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub disclosability: Disclosability,
    pub value: SchemaValue,
}

impl SchemaNode {
    pub fn never(value: SchemaValue) -> Self {
        Self {
            disclosability: Disclosability::NeverSelectively,
            value,
        }
    }

    pub fn always(value: SchemaValue) -> Self {
        Self {
            disclosability: Disclosability::AlwaysSelectively,
            value,
        }
    }
}

/// Object schema: attribute names mapped to tagged shapes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaObject {
    entries: IndexMap<String, SchemaNode>,
}

impl SchemaObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute expected in the clear.
    pub fn claim(self, name: impl Into<String>) -> Self {
        self.attribute(name, SchemaNode::never(SchemaValue::Claim))
    }

    /// Adds an attribute that must arrive through a disclosure.
    pub fn sd_claim(self, name: impl Into<String>) -> Self {
        self.attribute(name, SchemaNode::always(SchemaValue::Claim))
    }

    pub fn object(self, name: impl Into<String>, object: SchemaObject) -> Self {
        self.attribute(name, SchemaNode::never(SchemaValue::Object(object)))
    }

    pub fn sd_object(self, name: impl Into<String>, object: SchemaObject) -> Self {
        self.attribute(name, SchemaNode::always(SchemaValue::Object(object)))
    }

    pub fn array(self, name: impl Into<String>, array: SchemaArray) -> Self {
        self.attribute(name, SchemaNode::never(SchemaValue::Array(array)))
    }

    pub fn sd_array(self, name: impl Into<String>, array: SchemaArray) -> Self {
        self.attribute(name, SchemaNode::always(SchemaValue::Array(array)))
    }

    /// Adds an attribute with an explicit tagged shape.
    pub fn attribute(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.entries.insert(name.into(), node);
        self
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }
}

/// Array schema: one tagged shape per expected element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaArray {
    elements: Vec<SchemaNode>,
}

impl SchemaArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element expected in the clear.
    pub fn element(self, value: SchemaValue) -> Self {
        self.push(SchemaNode::never(value))
    }

    /// Appends an element that must arrive through a disclosure.
    pub fn sd_element(self, value: SchemaValue) -> Self {
        self.push(SchemaNode::always(value))
    }

    pub fn push(mut self, node: SchemaNode) -> Self {
        self.elements.push(node);
        self
    }

    /// The single element template, when the schema is uniform.
    ///
    /// Arrays are validated position-independently, so all declared elements
    /// must agree; a non-uniform array schema validates nothing.
    pub fn uniform_template(&self) -> Option<&SchemaNode> {
        let (first, rest) = self.elements.split_first()?;

        if rest.iter().all(|node| node == first) {
            Some(first)
        } else {
            None
        }
    }
}

/// Derives the definition schema matching an issuance tree, keeping issuer
/// and verifier definitions in lockstep.
pub fn shape_of(object: &DisclosableObject) -> SchemaObject {
    let mut schema = SchemaObject::new();

    for (name, node) in object.iter() {
        schema = schema.attribute(name, shape_of_node(&node.value, node.disclosability));
    }

    schema
}

fn shape_of_node(value: &DisclosableValue, disclosability: Disclosability) -> SchemaNode {
    let value = match value {
        DisclosableValue::Json(_) => SchemaValue::Claim,
        DisclosableValue::Object(object) => SchemaValue::Object(shape_of(object)),
        DisclosableValue::Array(array) => {
            let mut schema = SchemaArray::new();
            for element in array.iter() {
                schema = schema.push(shape_of_node(&element.value, element.disclosability));
            }
            SchemaValue::Array(schema)
        }
    };

    SchemaNode {
        disclosability,
        value,
    }
}

/// Schema violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The payload carries an attribute the schema does not declare.
    #[error("unknown attribute `{0}`")]
    UnknownAttribute(ClaimPath),

    /// The value at the path does not have the declared container type.
    #[error("attribute `{0}` has the wrong type")]
    WrongAttributeType(ClaimPath),

    /// The claim was embedded where the schema demands a disclosure, or
    /// disclosed where the schema demands an embedded value.
    #[error("attribute `{0}` was not disclosed in the required manner")]
    IncorrectlyDisclosed(ClaimPath),
}

/// Validates a processed claim set against a definition schema.
///
/// The check is exhaustive: every violation is collected and returned, never
/// just the first. An empty result means the claim set is valid. Well-known
/// JWT/VC claims at the root are ignored.
pub fn validate(
    claims: &Map<String, Value>,
    ledger: &DisclosureLedger,
    schema: &SchemaObject,
) -> Vec<SchemaError> {
    let mut errors = Vec::new();

    validate_object(
        claims,
        schema,
        &ClaimPath::root(),
        ledger,
        &mut errors,
        true,
    );

    errors
}

fn validate_object(
    actual: &Map<String, Value>,
    schema: &SchemaObject,
    path: &ClaimPath,
    ledger: &DisclosureLedger,
    errors: &mut Vec<SchemaError>,
    at_root: bool,
) {
    let enclosing = ledger.disclosures_at(path).len();

    for (name, value) in actual {
        if at_root && WELL_KNOWN_CLAIMS.contains(&name.as_str()) {
            continue;
        }

        let attribute_path = path.key(name);

        let Some(node) = schema.get(name) else {
            errors.push(SchemaError::UnknownAttribute(attribute_path));
            continue;
        };

        check_node(value, node, attribute_path, enclosing, ledger, errors);
    }
}

fn validate_array(
    actual: &[Value],
    schema: &SchemaArray,
    path: &ClaimPath,
    ledger: &DisclosureLedger,
    errors: &mut Vec<SchemaError>,
) {
    // Without a single template there is no position-independent rule to
    // apply, so the array body is skipped.
    let Some(template) = schema.uniform_template() else {
        return;
    };

    let enclosing = ledger.disclosures_at(path).len();

    for (i, value) in actual.iter().enumerate() {
        check_node(value, template, path.index(i), enclosing, ledger, errors);
    }
}

fn check_node(
    value: &Value,
    node: &SchemaNode,
    path: ClaimPath,
    enclosing_disclosures: usize,
    ledger: &DisclosureLedger,
    errors: &mut Vec<SchemaError>,
) {
    let disclosed = ledger.disclosures_at(&path).len() > enclosing_disclosures;
    let required = node.disclosability == Disclosability::AlwaysSelectively;

    if disclosed != required {
        errors.push(SchemaError::IncorrectlyDisclosed(path.clone()));
    }

    // `null` short-circuits the type recursion; disclosability was already
    // checked above.
    if value.is_null() {
        return;
    }

    match &node.value {
        SchemaValue::Claim => {}
        SchemaValue::Object(schema) => match value {
            Value::Object(actual) => {
                validate_object(actual, schema, &path, ledger, errors, false)
            }
            _ => errors.push(SchemaError::WrongAttributeType(path)),
        },
        SchemaValue::Array(schema) => match value {
            Value::Array(actual) => validate_array(actual, schema, &path, ledger, errors),
            _ => errors.push(SchemaError::WrongAttributeType(path)),
        },
    }
}
