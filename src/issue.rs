use std::collections::HashSet;

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use rand::{rngs::ThreadRng, seq::SliceRandom, CryptoRng, RngCore};
use serde_json::{Map, Value};

use crate::{
    digest::SdAlg,
    disclosure::DisclosureBuf,
    tree::{Disclosability, DisclosableArray, DisclosableObject, DisclosableValue},
    InvalidSdJwt, SdJwtBuf, ARRAY_CLAIM_ITEM_PROPERTY_NAME, RESERVED_CLAIM_NAMES,
    SD_ALG_CLAIM_NAME, SD_CLAIM_NAME,
};

/// Source of per-disclosure salts.
///
/// Every salt must be unique within one credential; the factory treats a
/// repeated salt as a fatal error.
pub trait SaltSource {
    fn next_salt(&mut self) -> String;
}

/// Default salt source: 128 bits from a cryptographic RNG, base64url-encoded.
#[derive(Debug, Default)]
pub struct RandomSalts<R = ThreadRng>(pub R);

impl<R: CryptoRng + RngCore> SaltSource for RandomSalts<R> {
    fn next_salt(&mut self) -> String {
        const SALT_SIZE: usize = 128 / 8;

        let mut salt_bytes = [0u8; SALT_SIZE];
        self.0.fill_bytes(&mut salt_bytes);
        BASE64_URL_SAFE_NO_PAD.encode(salt_bytes)
    }
}

/// Source of decoy digests.
///
/// A decoy is a digest-shaped value with no disclosure pre-image, inserted to
/// obscure the number of selectively disclosable claims in an `_sd` array.
pub trait DecoySource {
    fn decoy_digest(&mut self, alg: SdAlg) -> String;
}

/// Default decoy source: the digest of random bytes of the same width as a
/// real digest, so decoys are indistinguishable from real entries.
#[derive(Debug, Default)]
pub struct RandomDecoys<R = ThreadRng>(pub R);

impl<R: CryptoRng + RngCore> DecoySource for RandomDecoys<R> {
    fn decoy_digest(&mut self, alg: SdAlg) -> String {
        let mut bytes = vec![0u8; alg.digest_len()];
        self.0.fill_bytes(&mut bytes);
        BASE64_URL_SAFE_NO_PAD.encode(alg.hash_bytes(&bytes))
    }
}

/// Minimum number of entries per emitted `_sd` array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecoyPolicy {
    /// No padding: `_sd` arrays contain real digests only.
    #[default]
    None,

    /// Every emitted `_sd` array is padded with decoys up to at least this
    /// many entries.
    AtLeast(usize),
}

/// Issuance error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueError {
    /// A claim name reserved by SD-JWT was used in the disclosable tree.
    #[error("reserved claim name `{0}` used at issuance")]
    ReservedClaimName(String),

    /// The salt source produced the same salt twice within one credential.
    /// This indicates a broken RNG and is not recoverable.
    #[error("salt source produced a duplicate salt")]
    SaltCollision,

    /// The decoy source kept producing digests colliding with already emitted
    /// ones. Like a salt collision, this indicates a broken RNG.
    #[error("decoy source repeatedly produced colliding digests")]
    DecoyCollision,
}

/// Issuer-side factory turning a [`DisclosableObject`] into a JWT claim set
/// with digest placeholders plus the matching disclosures.
///
/// The factory owns its salt source, decoy source and shuffle RNG for the
/// duration of an issuance; sharing one across threads requires external
/// synchronization.
#[derive(Debug)]
pub struct SdJwtFactory<S = RandomSalts, D = RandomDecoys, R = ThreadRng> {
    alg: SdAlg,
    decoy_policy: DecoyPolicy,
    salts: S,
    decoys: D,
    rng: R,
}

impl Default for SdJwtFactory {
    fn default() -> Self {
        Self::new(SdAlg::default())
    }
}

impl SdJwtFactory {
    /// Creates a factory with the default cryptographic salt and decoy
    /// sources and no decoy padding.
    pub fn new(alg: SdAlg) -> Self {
        Self::with_sources(
            alg,
            RandomSalts::default(),
            RandomDecoys::default(),
            rand::thread_rng(),
        )
    }
}

impl<S: SaltSource, D: DecoySource, R: CryptoRng + RngCore> SdJwtFactory<S, D, R> {
    /// Creates a factory with injected salt, decoy and shuffle sources.
    ///
    /// Deterministic sources produce reproducible credentials, which tests
    /// rely on.
    pub fn with_sources(alg: SdAlg, salts: S, decoys: D, rng: R) -> Self {
        Self {
            alg,
            decoy_policy: DecoyPolicy::None,
            salts,
            decoys,
            rng,
        }
    }

    /// Sets the minimum number of entries per emitted `_sd` array.
    pub fn decoy_policy(mut self, policy: DecoyPolicy) -> Self {
        self.decoy_policy = policy;
        self
    }

    pub fn alg(&self) -> SdAlg {
        self.alg
    }

    /// Issues the given disclosable tree.
    ///
    /// The resulting payload embeds every `NeverSelectively` value in the
    /// clear and replaces every `AlwaysSelectively` value with a digest
    /// placeholder whose disclosure is returned alongside. `_sd_alg` is set
    /// at the root iff at least one disclosure was emitted.
    pub fn issue(&mut self, claims: &DisclosableObject) -> Result<IssuedSdJwt, IssueError> {
        let mut ctx = IssueCtx::default();
        let mut payload = self.issue_object(claims, &mut ctx)?;

        if !ctx.disclosures.is_empty() {
            payload.insert(SD_ALG_CLAIM_NAME.to_owned(), self.alg.name().into());
        }

        Ok(IssuedSdJwt {
            payload,
            disclosures: ctx.disclosures,
        })
    }

    fn issue_object(
        &mut self,
        object: &DisclosableObject,
        ctx: &mut IssueCtx,
    ) -> Result<Map<String, Value>, IssueError> {
        let mut out = Map::new();
        let mut sd_digests = Vec::new();

        for (name, node) in object.iter() {
            if RESERVED_CLAIM_NAMES.contains(&name) {
                return Err(IssueError::ReservedClaimName(name.to_owned()));
            }

            let value = self.issue_value(&node.value, ctx)?;

            match node.disclosability {
                Disclosability::NeverSelectively => {
                    out.insert(name.to_owned(), value);
                }
                Disclosability::AlwaysSelectively => {
                    let salt = self.fresh_salt(ctx)?;
                    let disclosure = DisclosureBuf::encode_object(&salt, name, &value);
                    sd_digests.push(self.emit(disclosure, ctx));
                }
            }
        }

        if !sd_digests.is_empty() {
            if let DecoyPolicy::AtLeast(min) = self.decoy_policy {
                while sd_digests.len() < min {
                    sd_digests.push(self.fresh_decoy(ctx)?);
                }
            }

            // Hide real-vs-decoy and per-claim origin from the array order.
            sd_digests.shuffle(&mut self.rng);

            out.insert(
                SD_CLAIM_NAME.to_owned(),
                Value::Array(sd_digests.into_iter().map(Value::String).collect()),
            );
        }

        Ok(out)
    }

    fn issue_array(
        &mut self,
        array: &DisclosableArray,
        ctx: &mut IssueCtx,
    ) -> Result<Vec<Value>, IssueError> {
        let mut out = Vec::with_capacity(array.len());

        for node in array.iter() {
            let value = self.issue_value(&node.value, ctx)?;

            match node.disclosability {
                Disclosability::NeverSelectively => out.push(value),
                Disclosability::AlwaysSelectively => {
                    let salt = self.fresh_salt(ctx)?;
                    let disclosure = DisclosureBuf::encode_array_element(&salt, &value);
                    let digest = self.emit(disclosure, ctx);

                    let mut placeholder = Map::new();
                    placeholder.insert(ARRAY_CLAIM_ITEM_PROPERTY_NAME.to_owned(), digest.into());
                    out.push(Value::Object(placeholder));
                }
            }
        }

        Ok(out)
    }

    fn issue_value(
        &mut self,
        value: &DisclosableValue,
        ctx: &mut IssueCtx,
    ) -> Result<Value, IssueError> {
        Ok(match value {
            DisclosableValue::Json(value) => value.clone(),
            DisclosableValue::Object(object) => Value::Object(self.issue_object(object, ctx)?),
            DisclosableValue::Array(array) => Value::Array(self.issue_array(array, ctx)?),
        })
    }

    fn fresh_salt(&mut self, ctx: &mut IssueCtx) -> Result<String, IssueError> {
        let salt = self.salts.next_salt();

        if !ctx.salts.insert(salt.clone()) {
            return Err(IssueError::SaltCollision);
        }

        Ok(salt)
    }

    fn fresh_decoy(&mut self, ctx: &mut IssueCtx) -> Result<String, IssueError> {
        const MAX_ATTEMPTS: usize = 128;

        for _ in 0..MAX_ATTEMPTS {
            let decoy = self.decoys.decoy_digest(self.alg);
            if ctx.digests.insert(decoy.clone()) {
                return Ok(decoy);
            }
        }

        Err(IssueError::DecoyCollision)
    }

    fn emit(&mut self, disclosure: DisclosureBuf, ctx: &mut IssueCtx) -> String {
        let digest = self.alg.hash(disclosure.as_disclosure());
        ctx.digests.insert(digest.clone());
        ctx.disclosures.push(disclosure);
        digest
    }
}

#[derive(Default)]
struct IssueCtx {
    disclosures: Vec<DisclosureBuf>,
    salts: HashSet<String>,
    digests: HashSet<String>,
}

/// Result of an issuance: the payload claims to sign, and the disclosures to
/// hand to the holder.
#[derive(Debug, Clone)]
pub struct IssuedSdJwt {
    /// JWT claim set carrying `_sd` arrays and `{"...": digest}` placeholders.
    pub payload: Map<String, Value>,

    /// Disclosures emitted during the walk, in emission order.
    pub disclosures: Vec<DisclosureBuf>,
}

impl IssuedSdJwt {
    /// The payload as a JSON value.
    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    /// Assembles the compact SD-JWT form from the signed JWT over
    /// [`Self::payload`] and the emitted disclosures.
    pub fn into_compact(self, jwt: &str) -> Result<SdJwtBuf, InvalidSdJwt<String>> {
        let mut compact = String::with_capacity(jwt.len() + 1);
        compact.push_str(jwt);
        compact.push('~');

        for disclosure in &self.disclosures {
            compact.push_str(disclosure.as_str());
            compact.push('~');
        }

        SdJwtBuf::new(compact)
    }
}
