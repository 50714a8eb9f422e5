use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use serde_json::Value;
use std::{
    borrow::{Borrow, Cow},
    fmt,
};

use crate::RESERVED_CLAIM_NAMES;

pub(crate) const fn is_url_safe_base64_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_')
}

/// Invalid SD-JWT disclosure.
#[derive(Debug, thiserror::Error)]
#[error("invalid SD-JWT disclosure: `{0}`")]
pub struct InvalidDisclosure<T>(pub T);

/// Creates a static disclosure.
#[macro_export]
macro_rules! disclosure {
    ($s:literal) => {
        match $crate::Disclosure::from_str_const($s) {
            Ok(d) => d,
            Err(_) => panic!("invalid disclosure"),
        }
    };
}

/// Encoded disclosure.
///
/// An encoded disclosure is a url-safe base-64 string (without padding)
/// encoding a JSON array carrying the disclosure's parameters. Its digest is
/// always computed over this exact string, never over re-serialized JSON.
///
/// See: <https://www.ietf.org/archive/id/draft-ietf-oauth-selective-disclosure-jwt-12.html#section-5>
#[derive(PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Disclosure([u8]);

impl Disclosure {
    /// Parses the given `disclosure` bytes.
    ///
    /// Returns an error if the input value is not a valid url-safe base64
    /// string without padding.
    pub fn new<T: ?Sized + AsRef<[u8]>>(disclosure: &T) -> Result<&Self, InvalidDisclosure<&T>> {
        let bytes = disclosure.as_ref();
        if !bytes.is_empty() && bytes.iter().copied().all(is_url_safe_base64_char) {
            Ok(unsafe { Self::new_unchecked(bytes) })
        } else {
            Err(InvalidDisclosure(disclosure))
        }
    }

    /// Parses the given `disclosure` string.
    ///
    /// This function is limited to a `&str` input, but can be used in const
    /// contexts.
    pub const fn from_str_const(disclosure: &str) -> Result<&Self, InvalidDisclosure<&str>> {
        let bytes = disclosure.as_bytes();

        if bytes.is_empty() {
            return Err(InvalidDisclosure(disclosure));
        }

        let mut i = 0;
        while i < bytes.len() {
            if !is_url_safe_base64_char(bytes[i]) {
                return Err(InvalidDisclosure(disclosure));
            }

            i += 1
        }

        Ok(unsafe { Self::new_unchecked(bytes) })
    }

    /// Creates a new disclosure out of the given `bytes` without validation.
    ///
    /// # Safety
    ///
    /// The input bytes **must** be a non-empty url-safe base64 string without
    /// padding.
    pub const unsafe fn new_unchecked(bytes: &[u8]) -> &Self {
        std::mem::transmute(bytes)
    }

    /// Returns the underlying bytes of the disclosure.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns this disclosure as a string.
    pub fn as_str(&self) -> &str {
        unsafe {
            // SAFETY: disclosures are url-safe base-64 strings.
            std::str::from_utf8_unchecked(&self.0)
        }
    }
}

impl AsRef<[u8]> for Disclosure {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<str> for Disclosure {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Disclosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl fmt::Debug for Disclosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl ToOwned for Disclosure {
    type Owned = DisclosureBuf;

    fn to_owned(&self) -> Self::Owned {
        DisclosureBuf(self.as_bytes().to_owned())
    }
}

/// Owned disclosure.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DisclosureBuf(Vec<u8>);

impl DisclosureBuf {
    /// Encodes an object-property disclosure `[salt, name, value]`.
    pub fn encode_object(salt: &str, name: &str, value: &Value) -> Self {
        Self::encode(Value::Array(vec![
            salt.into(),
            name.to_owned().into(),
            value.clone(),
        ]))
    }

    /// Encodes an array-element disclosure `[salt, value]`.
    pub fn encode_array_element(salt: &str, value: &Value) -> Self {
        Self::encode(Value::Array(vec![salt.into(), value.clone()]))
    }

    fn encode(parts: Value) -> Self {
        Self(BASE64_URL_SAFE_NO_PAD.encode(parts.to_string()).into_bytes())
    }

    /// Borrows the disclosure.
    pub fn as_disclosure(&self) -> &Disclosure {
        unsafe {
            // SAFETY: `self.0` is a disclosure by construction.
            Disclosure::new_unchecked(&self.0)
        }
    }
}

impl Borrow<Disclosure> for DisclosureBuf {
    fn borrow(&self) -> &Disclosure {
        self.as_disclosure()
    }
}

impl AsRef<Disclosure> for DisclosureBuf {
    fn as_ref(&self) -> &Disclosure {
        self.as_disclosure()
    }
}

impl std::ops::Deref for DisclosureBuf {
    type Target = Disclosure;

    fn deref(&self) -> &Self::Target {
        self.as_disclosure()
    }
}

impl fmt::Display for DisclosureBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_disclosure().fmt(f)
    }
}

impl fmt::Debug for DisclosureBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_disclosure().fmt(f)
    }
}

/// Disclosure decoding error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisclosureDecodeError {
    /// Not base64url, not UTF-8 JSON, not an array, wrong arity, or a
    /// non-string salt or claim name.
    #[error("malformed disclosure")]
    Malformed,

    /// The disclosed claim name is reserved by SD-JWT.
    #[error("disclosure uses reserved claim name `{0}`")]
    ReservedClaimName(String),
}

/// Decoded disclosure.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedDisclosure<'a> {
    /// Encoded disclosure.
    pub encoded: Cow<'a, Disclosure>,

    /// Salt.
    pub salt: String,

    /// Disclosure description.
    pub desc: DisclosureDescription,
}

impl<'a> DecodedDisclosure<'a> {
    /// Decodes the given encoded disclosure.
    pub fn parse(encoded: &'a Disclosure) -> Result<Self, DisclosureDecodeError> {
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|_| DisclosureDecodeError::Malformed)?;

        let json: Value =
            serde_json::from_slice(&bytes).map_err(|_| DisclosureDecodeError::Malformed)?;

        let Value::Array(values) = json else {
            return Err(DisclosureDecodeError::Malformed);
        };

        let (salt, desc) = match values.as_slice() {
            [salt, name, value] => {
                let name = name.as_str().ok_or(DisclosureDecodeError::Malformed)?;

                if RESERVED_CLAIM_NAMES.contains(&name) {
                    return Err(DisclosureDecodeError::ReservedClaimName(name.to_owned()));
                }

                (
                    salt,
                    DisclosureDescription::ObjectProperty {
                        name: name.to_owned(),
                        value: value.clone(),
                    },
                )
            }
            [salt, value] => (salt, DisclosureDescription::ArrayElement(value.clone())),
            _ => return Err(DisclosureDecodeError::Malformed),
        };

        Ok(DecodedDisclosure {
            encoded: Cow::Borrowed(encoded),
            salt: salt
                .as_str()
                .ok_or(DisclosureDecodeError::Malformed)?
                .to_owned(),
            desc,
        })
    }

    /// Clones the encoded disclosure to fully own the decoded disclosure.
    pub fn into_owned(self) -> DecodedDisclosure<'static> {
        DecodedDisclosure {
            encoded: Cow::Owned(self.encoded.into_owned()),
            salt: self.salt,
            desc: self.desc,
        }
    }
}

/// Disclosure description.
#[derive(Debug, Clone, PartialEq)]
pub enum DisclosureDescription {
    /// Object-property disclosure.
    ObjectProperty {
        /// Claim name.
        name: String,

        /// Claim value.
        value: Value,
    },

    /// Array-element disclosure.
    ArrayElement(Value),
}
