use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Whether a claim must appear in the clear or behind a disclosure digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disclosability {
    /// The claim value is embedded in the payload as-is. No disclosure exists
    /// for it.
    NeverSelectively,

    /// The payload only carries a digest placeholder for the claim; the value
    /// travels out-of-band in a disclosure.
    AlwaysSelectively,
}

/// Value carried by a [`DisclosableNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum DisclosableValue {
    /// A plain JSON value, embedded (or disclosed) wholesale.
    Json(Value),

    /// A nested object whose entries carry their own disclosability.
    Object(DisclosableObject),

    /// A nested array whose elements carry their own disclosability.
    Array(DisclosableArray),
}

impl From<Value> for DisclosableValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<DisclosableObject> for DisclosableValue {
    fn from(object: DisclosableObject) -> Self {
        Self::Object(object)
    }
}

impl From<DisclosableArray> for DisclosableValue {
    fn from(array: DisclosableArray) -> Self {
        Self::Array(array)
    }
}

/// A tagged node of a disclosable claim tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DisclosableNode {
    pub disclosability: Disclosability,
    pub value: DisclosableValue,
}

impl DisclosableNode {
    pub fn never(value: impl Into<DisclosableValue>) -> Self {
        Self {
            disclosability: Disclosability::NeverSelectively,
            value: value.into(),
        }
    }

    pub fn always(value: impl Into<DisclosableValue>) -> Self {
        Self {
            disclosability: Disclosability::AlwaysSelectively,
            value: value.into(),
        }
    }
}

/// Description of a credential's object shape: claim names mapped to tagged
/// values. Insertion order is kept for reproducible issuance, but carries no
/// meaning.
///
/// Built with the chaining constructors; construction is pure data assembly
/// and performs no hashing or I/O:
///
/// ```
/// use sd_jwt_core::{DisclosableArray, DisclosableObject};
/// use serde_json::json;
///
/// let claims = DisclosableObject::new()
///     .claim("iss", json!("https://example.com/issuer"))
///     .sd_claim("given_name", json!("John"))
///     .sd_object(
///         "address",
///         DisclosableObject::new().claim("country", json!("DE")),
///     )
///     .array(
///         "nationalities",
///         DisclosableArray::new().sd_element(json!("DE")),
///     );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisclosableObject {
    entries: IndexMap<String, DisclosableNode>,
}

impl DisclosableObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a claim embedded in the clear.
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<DisclosableValue>) -> Self {
        self.entries.insert(name.into(), DisclosableNode::never(value));
        self
    }

    /// Adds a selectively disclosable claim.
    pub fn sd_claim(mut self, name: impl Into<String>, value: impl Into<DisclosableValue>) -> Self {
        self.entries.insert(name.into(), DisclosableNode::always(value));
        self
    }

    /// Adds a nested object embedded in the clear.
    pub fn object(self, name: impl Into<String>, object: DisclosableObject) -> Self {
        self.claim(name, object)
    }

    /// Adds a selectively disclosable nested object. The whole object travels
    /// in one disclosure.
    pub fn sd_object(self, name: impl Into<String>, object: DisclosableObject) -> Self {
        self.sd_claim(name, object)
    }

    /// Adds a nested array embedded in the clear.
    pub fn array(self, name: impl Into<String>, array: DisclosableArray) -> Self {
        self.claim(name, array)
    }

    /// Adds a selectively disclosable nested array. The whole array travels
    /// in one disclosure.
    pub fn sd_array(self, name: impl Into<String>, array: DisclosableArray) -> Self {
        self.sd_claim(name, array)
    }

    pub fn get(&self, name: &str) -> Option<&DisclosableNode> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DisclosableNode)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fully disclosed JSON projection of this tree: every claim in the
    /// clear, no digests, no markers.
    pub fn to_json(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(name, node)| (name.clone(), node.value.to_json()))
            .collect()
    }
}

/// Ordered sequence of tagged array elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisclosableArray {
    elements: Vec<DisclosableNode>,
}

impl DisclosableArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element embedded in the clear.
    pub fn element(mut self, value: impl Into<DisclosableValue>) -> Self {
        self.elements.push(DisclosableNode::never(value));
        self
    }

    /// Appends a selectively disclosable element.
    pub fn sd_element(mut self, value: impl Into<DisclosableValue>) -> Self {
        self.elements.push(DisclosableNode::always(value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &DisclosableNode> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The fully disclosed JSON projection of this array.
    pub fn to_json(&self) -> Vec<Value> {
        self.elements.iter().map(|node| node.value.to_json()).collect()
    }
}

impl DisclosableValue {
    /// The fully disclosed JSON projection of this value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Object(object) => Value::Object(object.to_json()),
            Self::Array(array) => Value::Array(array.to_json()),
        }
    }
}
