use std::str::FromStr;

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::disclosure::Disclosure;

/// Unknown `_sd_alg` value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown _sd_alg value `{0}`")]
pub struct UnknownSdAlg(pub String);

/// Hash algorithms usable as the `_sd_alg` claim, keyed by their IANA names.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SdAlg {
    /// SHA-256, the default digest algorithm.
    #[default]
    Sha256,

    /// SHA-384
    Sha384,

    /// SHA-512
    Sha512,

    /// SHA3-256
    Sha3_256,

    /// SHA3-384
    Sha3_384,

    /// SHA3-512
    Sha3_512,
}

impl SdAlg {
    const ALL: [SdAlg; 6] = [
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Sha3_256,
        Self::Sha3_384,
        Self::Sha3_512,
    ];

    /// IANA name of the algorithm, used as the `_sd_alg` claim value.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
            Self::Sha3_256 => "sha3-256",
            Self::Sha3_384 => "sha3-384",
            Self::Sha3_512 => "sha3-512",
        }
    }

    /// Alternate names accepted by [`SdAlg::from_name`].
    ///
    /// Some producers emit the hyphen-less OpenSSL spelling.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Sha256 => &["sha256"],
            Self::Sha384 => &["sha384"],
            Self::Sha512 => &["sha512"],
            Self::Sha3_256 | Self::Sha3_384 | Self::Sha3_512 => &[],
        }
    }

    /// Looks up an algorithm by IANA name or alias.
    pub fn from_name(name: &str) -> Result<Self, UnknownSdAlg> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == name || alg.aliases().contains(&name))
            .ok_or_else(|| UnknownSdAlg(name.to_owned()))
    }

    /// Width of the raw digest output, in bytes.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha256 | Self::Sha3_256 => 32,
            Self::Sha384 | Self::Sha3_384 => 48,
            Self::Sha512 | Self::Sha3_512 => 64,
        }
    }

    /// Hashes arbitrary bytes with this algorithm.
    pub fn hash_bytes(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => sha2::Sha256::digest(bytes).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(bytes).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(bytes).to_vec(),
            Self::Sha3_256 => sha3::Sha3_256::digest(bytes).to_vec(),
            Self::Sha3_384 => sha3::Sha3_384::digest(bytes).to_vec(),
            Self::Sha3_512 => sha3::Sha3_512::digest(bytes).to_vec(),
        }
    }

    /// Digest of the given disclosure: the base64url encoding of the hash of
    /// the encoded disclosure string.
    pub fn hash(&self, disclosure: &Disclosure) -> String {
        BASE64_URL_SAFE_NO_PAD.encode(self.hash_bytes(disclosure.as_bytes()))
    }
}

impl FromStr for SdAlg {
    type Err = UnknownSdAlg;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl TryFrom<&str> for SdAlg {
    type Error = UnknownSdAlg;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_name(value)
    }
}

impl From<SdAlg> for &'static str {
    fn from(value: SdAlg) -> Self {
        value.name()
    }
}

impl Serialize for SdAlg {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.name().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SdAlg {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
