use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::{
    claim_path::{ClaimPath, DisclosureLedger},
    digest::{SdAlg, UnknownSdAlg},
    disclosure::{DecodedDisclosure, DisclosureBuf, DisclosureDecodeError, DisclosureDescription},
    ARRAY_CLAIM_ITEM_PROPERTY_NAME, SD_ALG_CLAIM_NAME, SD_CLAIM_NAME,
};

/// Nesting bound for the recreation walk. Disclosure values can themselves
/// carry digests, so the nesting depth is controlled by whoever supplies the
/// disclosure bag.
const MAX_DEPTH: usize = 64;

/// Recreation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevealError {
    /// A disclosure in the bag failed to decode.
    #[error(transparent)]
    Disclosure(#[from] DisclosureDecodeError),

    /// The root `_sd_alg` claim names an unsupported algorithm.
    #[error(transparent)]
    UnknownSdAlg(#[from] UnknownSdAlg),

    /// Disclosures were supplied but the payload carries no `_sd_alg` claim.
    #[error("payload has disclosures but no _sd_alg claim")]
    MissingSdAlg,

    /// The `_sd_alg` claim is not a string.
    #[error("_sd_alg claim is not a string")]
    SdAlgWrongType,

    /// Two disclosures in the bag hash to the same digest.
    #[error("multiple disclosures share the digest `{0}`")]
    DuplicateDisclosure(String),

    /// An `_sd` claim value is not an array.
    #[error("`_sd` claim value is not an array")]
    SdClaimNotArray,

    /// An `_sd` array entry is not a string.
    #[error("`_sd` array entry is not a string")]
    SdDigestNotString,

    /// A disclosed claim name already exists in the enclosing object.
    #[error("disclosed claim `{0}` collides with an existing claim")]
    ClaimCollision(String),

    /// An `_sd` digest resolved to an array-element disclosure.
    #[error("expected object-property disclosure, found array-element disclosure")]
    ExpectedObjectProperty,

    /// An array placeholder digest resolved to an object-property disclosure.
    #[error("expected array-element disclosure, found object-property disclosure")]
    ExpectedArrayElement,

    /// The same disclosure is referenced from more than one placeholder.
    #[error("disclosure is referenced multiple times")]
    DisclosureUsedMultipleTimes,

    /// A disclosure in the bag matched no digest in the payload.
    #[error("unused disclosure `{0}`")]
    UnusedDisclosure(DisclosureBuf),

    /// Strict mode only: a payload digest matched no supplied disclosure.
    #[error("no disclosure matches digest `{0}`")]
    DigestNotFound(String),

    /// The payload or its disclosures nest deeper than [`MAX_DEPTH`].
    #[error("claim nesting exceeds the supported depth")]
    DepthLimitExceeded,
}

/// Recreation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevealOptions {
    /// When set, every digest placeholder in the payload must resolve to a
    /// supplied disclosure. By default unmatched placeholders are skipped,
    /// which is how presentations with withheld claims verify.
    pub strict: bool,
}

/// Result of a recreation pass: the processed claim set and the per-path
/// disclosure ledger.
#[derive(Debug, Clone)]
pub struct Recreated {
    /// Processed claims, free of `_sd`, `_sd_alg` and `...` markers.
    ///
    /// Keys copied from the payload keep their input order; disclosed keys
    /// follow, in the order their digests appeared in `_sd`.
    pub claims: Map<String, Value>,

    /// Disclosures consumed per claim path.
    pub ledger: DisclosureLedger,
}

impl Recreated {
    /// The claims as a JSON value.
    pub fn claims_value(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Computes the disclosure subset needed to present exactly the claims at
    /// the given paths, including the disclosures of enclosing claims.
    ///
    /// The subset preserves first-seen order and never repeats a disclosure.
    pub fn disclosures_for(&self, paths: &[ClaimPath]) -> Vec<DisclosureBuf> {
        let mut subset: Vec<DisclosureBuf> = Vec::new();

        for path in paths {
            for disclosure in self.ledger.disclosures_at(path) {
                if !subset.contains(disclosure) {
                    subset.push(disclosure.clone());
                }
            }
        }

        subset
    }
}

/// Recreates the original claim set from an SD-JWT payload and a bag of
/// disclosures, with default options.
pub fn recreate(
    payload: &Map<String, Value>,
    disclosures: &[DisclosureBuf],
) -> Result<Recreated, RevealError> {
    recreate_with(payload, disclosures, RevealOptions::default())
}

/// Recreates the original claim set from an SD-JWT payload and a bag of
/// disclosures.
///
/// Every supplied disclosure must be consumed by some digest in the payload
/// (directly, or recursively through the value of another disclosure);
/// left-over disclosures fail the whole pass.
pub fn recreate_with(
    payload: &Map<String, Value>,
    disclosures: &[DisclosureBuf],
    options: RevealOptions,
) -> Result<Recreated, RevealError> {
    let sd_alg = match payload.get(SD_ALG_CLAIM_NAME) {
        Some(value) => value
            .as_str()
            .ok_or(RevealError::SdAlgWrongType)?
            .parse::<SdAlg>()?,
        None if disclosures.is_empty() => SdAlg::default(),
        None => return Err(RevealError::MissingSdAlg),
    };

    let mut walk = Walk {
        index: IndexMap::new(),
        ledger: DisclosureLedger::default(),
        trail: Vec::new(),
        strict: options.strict,
    };

    for disclosure in disclosures {
        let decoded = DecodedDisclosure::parse(disclosure.as_disclosure())?;
        let digest = sd_alg.hash(disclosure.as_disclosure());

        let pending = Pending {
            source: disclosure,
            decoded,
            used: false,
        };

        if walk.index.insert(digest.clone(), pending).is_some() {
            return Err(RevealError::DuplicateDisclosure(digest));
        }
    }

    let claims = walk.object(payload, &ClaimPath::root(), 0)?;

    for pending in walk.index.values() {
        if !pending.used {
            return Err(RevealError::UnusedDisclosure(pending.source.clone()));
        }
    }

    Ok(Recreated {
        claims,
        ledger: walk.ledger,
    })
}

struct Pending<'d> {
    source: &'d DisclosureBuf,
    decoded: DecodedDisclosure<'d>,
    used: bool,
}

struct Walk<'d> {
    index: IndexMap<String, Pending<'d>>,
    ledger: DisclosureLedger,
    trail: Vec<DisclosureBuf>,
    strict: bool,
}

impl Walk<'_> {
    fn value(&mut self, value: &Value, path: &ClaimPath, depth: usize) -> Result<Value, RevealError> {
        match value {
            Value::Object(object) => Ok(Value::Object(self.object(object, path, depth)?)),
            Value::Array(items) => Ok(Value::Array(self.array(items, path, depth)?)),
            other => {
                self.ledger.record(path.clone(), self.trail.clone());
                Ok(other.clone())
            }
        }
    }

    fn object(
        &mut self,
        object: &Map<String, Value>,
        path: &ClaimPath,
        depth: usize,
    ) -> Result<Map<String, Value>, RevealError> {
        if depth > MAX_DEPTH {
            return Err(RevealError::DepthLimitExceeded);
        }

        self.ledger.record(path.clone(), self.trail.clone());

        let mut out = Map::new();

        // Copy plain entries first, preserving their input order.
        for (name, value) in object {
            if name == SD_CLAIM_NAME || name == SD_ALG_CLAIM_NAME {
                continue;
            }

            let child = self.value(value, &path.key(name), depth + 1)?;
            out.insert(name.clone(), child);
        }

        // Then resolve `_sd` digests, in array order.
        if let Some(sd_claims) = object.get(SD_CLAIM_NAME) {
            let digests = sd_claims.as_array().ok_or(RevealError::SdClaimNotArray)?;

            for digest in digests {
                let digest = digest.as_str().ok_or(RevealError::SdDigestNotString)?;

                let Some((source, name, value)) = self.consume_property(digest)? else {
                    continue;
                };

                if out.contains_key(&name) {
                    return Err(RevealError::ClaimCollision(name));
                }

                let child_path = path.key(&name);
                self.trail.push(source);
                let child = self.value(&value, &child_path, depth + 1)?;
                self.trail.pop();

                out.insert(name, child);
            }
        }

        Ok(out)
    }

    fn array(
        &mut self,
        items: &[Value],
        path: &ClaimPath,
        depth: usize,
    ) -> Result<Vec<Value>, RevealError> {
        if depth > MAX_DEPTH {
            return Err(RevealError::DepthLimitExceeded);
        }

        self.ledger.record(path.clone(), self.trail.clone());

        let mut out = Vec::with_capacity(items.len());

        for item in items {
            match as_placeholder(item) {
                Some(digest) => {
                    let Some((source, value)) = self.consume_element(digest)? else {
                        // Withheld element: drops out of the processed array.
                        continue;
                    };

                    let element_path = path.index(out.len());
                    self.trail.push(source);
                    let child = self.value(&value, &element_path, depth + 1)?;
                    self.trail.pop();

                    out.push(child);
                }
                None => {
                    let child = self.value(item, &path.index(out.len()), depth + 1)?;
                    out.push(child);
                }
            }
        }

        Ok(out)
    }

    fn consume_property(
        &mut self,
        digest: &str,
    ) -> Result<Option<(DisclosureBuf, String, Value)>, RevealError> {
        match self.index.get_mut(digest) {
            Some(pending) => {
                if pending.used {
                    return Err(RevealError::DisclosureUsedMultipleTimes);
                }
                pending.used = true;

                match &pending.decoded.desc {
                    DisclosureDescription::ObjectProperty { name, value } => {
                        Ok(Some((pending.source.clone(), name.clone(), value.clone())))
                    }
                    DisclosureDescription::ArrayElement(_) => {
                        Err(RevealError::ExpectedObjectProperty)
                    }
                }
            }
            None if self.strict => Err(RevealError::DigestNotFound(digest.to_owned())),
            None => Ok(None),
        }
    }

    fn consume_element(
        &mut self,
        digest: &str,
    ) -> Result<Option<(DisclosureBuf, Value)>, RevealError> {
        match self.index.get_mut(digest) {
            Some(pending) => {
                if pending.used {
                    return Err(RevealError::DisclosureUsedMultipleTimes);
                }
                pending.used = true;

                match &pending.decoded.desc {
                    DisclosureDescription::ArrayElement(value) => {
                        Ok(Some((pending.source.clone(), value.clone())))
                    }
                    DisclosureDescription::ObjectProperty { .. } => {
                        Err(RevealError::ExpectedArrayElement)
                    }
                }
            }
            None if self.strict => Err(RevealError::DigestNotFound(digest.to_owned())),
            None => Ok(None),
        }
    }
}

fn as_placeholder(item: &Value) -> Option<&str> {
    let object = item.as_object()?;

    if object.len() != 1 {
        return None;
    }

    object.get(ARRAY_CLAIM_ITEM_PROPERTY_NAME)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disclosure::DisclosureBuf;
    use serde_json::json;

    #[test]
    fn depth_limit_stops_disclosure_bombs() {
        // A chain of disclosures each hiding the next, nested past the bound.
        let mut value = json!("leaf");
        let mut disclosures = Vec::new();

        for i in 0..(MAX_DEPTH + 2) {
            let disclosure =
                DisclosureBuf::encode_object(&format!("salt{i}"), "nested", &json!({ "v": value }));
            let digest = SdAlg::Sha256.hash(disclosure.as_disclosure());
            value = json!({ "_sd": [digest] });
            disclosures.push(disclosure);
        }

        let Value::Object(mut payload) = value else {
            unreachable!()
        };
        payload.insert("_sd_alg".to_owned(), json!("sha-256"));

        assert_eq!(
            recreate(&payload, &disclosures).unwrap_err(),
            RevealError::DepthLimitExceeded,
        );
    }

    #[test]
    fn strict_mode_requires_every_digest() {
        let digest = "0000000000000000000000000000000000000000000";
        let mut payload = Map::new();
        payload.insert("_sd".to_owned(), json!([digest]));
        payload.insert("_sd_alg".to_owned(), json!("sha-256"));

        assert!(recreate(&payload, &[]).is_ok());
        assert_eq!(
            recreate_with(&payload, &[], RevealOptions { strict: true }).unwrap_err(),
            RevealError::DigestNotFound(digest.to_owned()),
        );
    }
}
