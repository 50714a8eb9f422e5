use serde_json::{Map, Value};

use crate::{
    reveal::{recreate_with, Recreated, RevealError, RevealOptions},
    SdJwt,
};

/// Capability checking the JWS over the issuer-signed JWT.
///
/// Implementations own key resolution (JWK, X.509, DID, metadata fetch) and
/// the actual signature primitive; the claim engine never sees keys. The
/// contract is synchronous; asynchronous hosts resolve before calling in.
pub trait SignatureVerifier {
    type Error: std::error::Error;

    /// Checks the signature of the given compact JWT and returns its decoded
    /// payload claims.
    fn verify_jwt(&self, jwt: &str) -> Result<Map<String, Value>, Self::Error>;
}

/// Capability applying the key-binding policy of a presentation.
///
/// The policy decides whether a KB-JWT must be present and how its challenge
/// and audience are checked. Errors pass through the engine unchanged.
pub trait KeyBindingVerifier {
    type Error: std::error::Error;

    fn verify_key_binding(
        &self,
        kb_jwt: Option<&str>,
        claims: &Map<String, Value>,
    ) -> Result<(), Self::Error>;
}

/// Presentation processing error.
#[derive(Debug, thiserror::Error)]
pub enum PresentationError<S, K>
where
    S: std::error::Error,
    K: std::error::Error,
{
    /// The issuer signature was rejected.
    #[error("issuer signature rejected: {0}")]
    Signature(S),

    /// The key-binding policy was not satisfied.
    #[error("key binding rejected: {0}")]
    KeyBinding(K),

    /// Claim recreation failed.
    #[error(transparent)]
    Reveal(#[from] RevealError),
}

/// Boundary adapter: splits a compact SD-JWT, checks the issuer signature,
/// recreates the disclosed claims, and applies the key-binding policy.
pub fn present_and_recreate<V, K>(
    sd_jwt: &SdJwt,
    verifier: &V,
    key_binding: &K,
    options: RevealOptions,
) -> Result<Recreated, PresentationError<V::Error, K::Error>>
where
    V: SignatureVerifier,
    K: KeyBindingVerifier,
{
    let parts = sd_jwt.parts();

    let payload = verifier
        .verify_jwt(parts.jwt)
        .map_err(PresentationError::Signature)?;

    let disclosures: Vec<_> = parts
        .disclosures
        .iter()
        .map(|d| (*d).to_owned())
        .collect();

    let recreated = recreate_with(&payload, &disclosures, options)?;

    key_binding
        .verify_key_binding(parts.key_binding_jwt, &recreated.claims)
        .map_err(PresentationError::KeyBinding)?;

    Ok(recreated)
}
