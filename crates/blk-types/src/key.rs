use std::fmt;

use data_encoding::BASE32_NOPAD;

use crate::error::TypeError;
use crate::extension::Extension;
use crate::multihash::Multihash;

/// Number of leading encoded characters used as the shard directory.
///
/// 32^5 possible buckets bounds per-directory fan-out without an index.
pub const SHARD_PREFIX_LEN: usize = 5;

/// RFC 4648 base-32, uppercase, no padding.
pub fn encode_base32(bytes: &[u8]) -> String {
    BASE32_NOPAD.encode(bytes)
}

/// Inverse of [`encode_base32`]. Lowercase input is accepted.
pub fn decode_base32(s: &str) -> Result<Vec<u8>, TypeError> {
    BASE32_NOPAD
        .decode(s.to_ascii_uppercase().as_bytes())
        .map_err(|e| TypeError::InvalidBase32(e.to_string()))
}

/// Location-independent name of a stored block.
///
/// Formats as `{shard_prefix}/{encoded}.{extension}`, e.g.
/// `CIQLS/CIQLSTJHXGJU2PQIUUXFFV62PWV7VREE57RXUU4A52IIR55M4LX432I.data`.
/// Every supported multihash is at least three bytes, so the encoded form
/// always covers the shard prefix.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    digest: Multihash,
    encoded: String,
    extension: Extension,
}

impl StorageKey {
    pub fn new(digest: Multihash, extension: Extension) -> Self {
        let encoded = encode_base32(&digest.to_bytes());
        Self {
            digest,
            encoded,
            extension,
        }
    }

    pub fn digest(&self) -> &Multihash {
        &self.digest
    }

    /// Full base-32 encoding of the digest.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn shard_prefix(&self) -> &str {
        &self.encoded[..SHARD_PREFIX_LEN]
    }

    pub fn extension(&self) -> &Extension {
        &self.extension
    }

    /// `{encoded}.{extension}`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.encoded, self.extension)
    }

    /// Same digest under another extension.
    pub fn with_extension(&self, extension: Extension) -> Self {
        Self {
            digest: self.digest.clone(),
            encoded: self.encoded.clone(),
            extension,
        }
    }

    /// Parse a textual key.
    ///
    /// Accepted forms: `PREFX/NAME.ext`, `NAME.ext`, `NAME`, where `NAME` is
    /// the base-32 encoding of a multihash (any case) or its hex form. In the
    /// path form the prefix must match the name.
    pub fn parse(s: &str) -> Result<ParsedKey, TypeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid(s, "empty key"));
        }

        let (prefix, file) = match trimmed.split_once('/') {
            Some((prefix, file)) => (Some(prefix), file),
            None => (None, trimmed),
        };
        let (name, extension) = match file.rsplit_once('.') {
            Some((name, ext)) => (name, Some(Extension::new(ext)?)),
            None => (file, None),
        };

        let digest = decode_name(name).map_err(|reason| invalid(s, &reason))?;
        if let Some(prefix) = prefix {
            let encoded = encode_base32(&digest.to_bytes());
            if !prefix.eq_ignore_ascii_case(&encoded[..SHARD_PREFIX_LEN]) {
                return Err(invalid(s, "shard prefix does not match digest"));
            }
        }
        Ok(ParsedKey { digest, extension })
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}.{}",
            self.shard_prefix(),
            self.encoded,
            self.extension
        )
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({self})")
    }
}

fn invalid(key: &str, reason: &str) -> TypeError {
    TypeError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn decode_name(name: &str) -> Result<Multihash, String> {
    if name.is_empty() {
        return Err("empty digest".into());
    }
    let base32_err = match decode_base32(name).and_then(|bytes| Multihash::from_bytes(&bytes)) {
        Ok(digest) => return Ok(digest),
        Err(e) => e,
    };
    Multihash::from_hex(name)
        .map_err(|hex_err| format!("not a base32 ({base32_err}) or hex ({hex_err}) multihash"))
}

/// Digest and optional extension recovered from caller input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedKey {
    pub digest: Multihash,
    pub extension: Option<Extension>,
}

/// Any form a caller may use to name a block.
///
/// `Option<T>` converts with `None` becoming [`KeyInput::Missing`], which
/// always fails to resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyInput {
    Missing,
    Digest(Multihash),
    /// Binary multihash.
    Raw(Vec<u8>),
    /// Encoded key, encoded path, or hex multihash.
    Text(String),
    Key(StorageKey),
}

impl KeyInput {
    pub fn resolve(self) -> Result<ParsedKey, TypeError> {
        match self {
            Self::Missing => Err(invalid("", "no key supplied")),
            Self::Digest(digest) => Ok(ParsedKey {
                digest,
                extension: None,
            }),
            Self::Raw(bytes) if bytes.is_empty() => Err(invalid("", "empty digest")),
            Self::Raw(bytes) => Ok(ParsedKey {
                digest: Multihash::from_bytes(&bytes)?,
                extension: None,
            }),
            Self::Text(text) => StorageKey::parse(&text),
            Self::Key(key) => Ok(ParsedKey {
                digest: key.digest,
                extension: Some(key.extension),
            }),
        }
    }
}

impl From<Multihash> for KeyInput {
    fn from(digest: Multihash) -> Self {
        Self::Digest(digest)
    }
}

impl From<&Multihash> for KeyInput {
    fn from(digest: &Multihash) -> Self {
        Self::Digest(digest.clone())
    }
}

impl From<StorageKey> for KeyInput {
    fn from(key: StorageKey) -> Self {
        Self::Key(key)
    }
}

impl From<&StorageKey> for KeyInput {
    fn from(key: &StorageKey) -> Self {
        Self::Key(key.clone())
    }
}

impl From<&str> for KeyInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for KeyInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&[u8]> for KeyInput {
    fn from(bytes: &[u8]) -> Self {
        Self::Raw(bytes.to_vec())
    }
}

impl From<Vec<u8>> for KeyInput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

impl<T: Into<KeyInput>> From<Option<T>> for KeyInput {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multihash::HashCode;
    use proptest::prelude::*;

    // sha2-256("hello world")
    const HELLO_HEX: &str = "1220b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const HELLO_B32: &str = "CIQLSTJHXGJU2PQIUUXFFV62PWV7VREE57RXUU4A52IIR55M4LX432I";

    fn hello() -> Multihash {
        Multihash::from_hex(HELLO_HEX).unwrap()
    }

    #[test]
    fn known_vector_layout() {
        let key = StorageKey::new(hello(), Extension::default());
        assert_eq!(key.encoded(), HELLO_B32);
        assert_eq!(key.shard_prefix(), "CIQLS");
        assert_eq!(key.to_string(), format!("CIQLS/{HELLO_B32}.data"));
        assert_eq!(key.file_name(), format!("{HELLO_B32}.data"));
    }

    #[test]
    fn base32_is_uppercase_without_padding() {
        let s = encode_base32(b"f");
        assert_eq!(s, "MY");
        assert_eq!(decode_base32("my").unwrap(), b"f");
        assert!(decode_base32("M1").is_err());
    }

    #[test]
    fn parse_path_form() {
        let parsed = StorageKey::parse(&format!("CIQLS/{HELLO_B32}.ipld")).unwrap();
        assert_eq!(parsed.digest, hello());
        assert_eq!(parsed.extension, Some(Extension::new("ipld").unwrap()));
    }

    #[test]
    fn parse_bare_name_and_hex() {
        let parsed = StorageKey::parse(HELLO_B32).unwrap();
        assert_eq!(parsed.digest, hello());
        assert_eq!(parsed.extension, None);

        let parsed = StorageKey::parse(&HELLO_B32.to_lowercase()).unwrap();
        assert_eq!(parsed.digest, hello());

        let parsed = StorageKey::parse(HELLO_HEX).unwrap();
        assert_eq!(parsed.digest, hello());
    }

    #[test]
    fn parse_rejects_wrong_prefix() {
        let err = StorageKey::parse(&format!("AAAAA/{HELLO_B32}.data")).unwrap_err();
        assert!(matches!(err, TypeError::InvalidKey { .. }));
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "   ", "not a key", "CIQ", "zz", ".data", "CIQLS/.data"] {
            assert!(StorageKey::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn missing_input_never_resolves() {
        assert!(KeyInput::Missing.resolve().is_err());
        assert_eq!(KeyInput::from(None::<&str>), KeyInput::Missing);
        assert!(KeyInput::from(Vec::new()).resolve().is_err());
    }

    #[test]
    fn resolve_each_form() {
        let key = StorageKey::new(hello(), Extension::new("ipld").unwrap());
        let from_key = KeyInput::from(&key).resolve().unwrap();
        assert_eq!(from_key.extension.as_ref(), Some(key.extension()));

        let from_raw = KeyInput::from(hello().to_bytes()).resolve().unwrap();
        assert_eq!(from_raw.digest, hello());

        let from_some = KeyInput::from(Some(HELLO_B32)).resolve().unwrap();
        assert_eq!(from_some.digest, hello());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let key = StorageKey::new(hello(), Extension::new("ipld").unwrap());
        let parsed = StorageKey::parse(&key.to_string()).unwrap();
        let rebuilt = StorageKey::new(parsed.digest, parsed.extension.unwrap());
        assert_eq!(rebuilt, key);
    }

    #[test]
    fn with_extension_keeps_digest() {
        let key = StorageKey::new(hello(), Extension::default());
        let other = key.with_extension(Extension::new("ipld").unwrap());
        assert_eq!(other.encoded(), key.encoded());
        assert_ne!(other, key);
    }

    proptest! {
        #[test]
        fn key_derivation_is_deterministic(digest in proptest::collection::vec(any::<u8>(), 1..=32)) {
            let a = StorageKey::new(Multihash::new(HashCode::Sha2_256, digest.clone()).unwrap(), Extension::default());
            let b = StorageKey::new(Multihash::new(HashCode::Sha2_256, digest).unwrap(), Extension::default());
            prop_assert_eq!(a.shard_prefix().len(), SHARD_PREFIX_LEN);
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.to_string(), b.to_string());
        }

        #[test]
        fn encoded_names_parse_back(digest in proptest::collection::vec(any::<u8>(), 1..=64)) {
            let mh = Multihash::new(HashCode::Sha2_512, digest).unwrap();
            let key = StorageKey::new(mh.clone(), Extension::default());
            prop_assert_eq!(StorageKey::parse(key.encoded()).unwrap().digest, mh);
        }
    }
}
