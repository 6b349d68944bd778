use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Longest varint accepted for a code or length prefix.
const MAX_VARINT_LEN: usize = 9;

/// Digest algorithms a [`Multihash`] may carry.
///
/// The discriminants are the registered multicodec table codes, so the code
/// written into the binary form never changes meaning across implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashCode {
    #[serde(rename = "sha2-256")]
    Sha2_256,
    #[serde(rename = "sha2-512")]
    Sha2_512,
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashCode {
    /// Multicodec table code.
    pub const fn code(self) -> u64 {
        match self {
            Self::Sha2_256 => 0x12,
            Self::Sha2_512 => 0x13,
            Self::Blake3 => 0x1e,
        }
    }

    /// Look up an algorithm by its multicodec code.
    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x12 => Ok(Self::Sha2_256),
            0x13 => Ok(Self::Sha2_512),
            0x1e => Ok(Self::Blake3),
            other => Err(TypeError::UnsupportedHash(other)),
        }
    }

    /// Full digest size in bytes.
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha2_256 | Self::Blake3 => 32,
            Self::Sha2_512 => 64,
        }
    }
}

impl Default for HashCode {
    fn default() -> Self {
        Self::Sha2_256
    }
}

impl fmt::Display for HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha2_256 => write!(f, "sha2-256"),
            Self::Sha2_512 => write!(f, "sha2-512"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// Self-describing content digest.
///
/// The binary form is `varint(code) || varint(len) || digest`, so two
/// algorithms can never produce the same encoded value. A digest is never
/// empty and never longer than its algorithm's full output.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Multihash {
    code: HashCode,
    digest: Vec<u8>,
}

impl Multihash {
    /// Wrap a digest produced by `code`.
    pub fn new(code: HashCode, digest: impl Into<Vec<u8>>) -> Result<Self, TypeError> {
        let digest = digest.into();
        if digest.is_empty() || digest.len() > code.digest_len() {
            return Err(TypeError::InvalidLength {
                expected: code.digest_len(),
                actual: digest.len(),
            });
        }
        Ok(Self { code, digest })
    }

    /// Digest algorithm.
    pub fn code(&self) -> HashCode {
        self.code
    }

    /// Raw hash bytes without the prefix.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Binary multihash form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.digest.len() + 2);
        write_varint(self.code.code(), &mut out);
        write_varint(self.digest.len() as u64, &mut out);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Parse the binary multihash form. Trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        let (code, used) = read_varint(bytes)?;
        let rest = &bytes[used..];
        let (len, used) = read_varint(rest)?;
        let digest = &rest[used..];
        let code = HashCode::from_code(code)?;
        if digest.len() as u64 != len {
            return Err(TypeError::MalformedMultihash(format!(
                "length prefix says {len} bytes, found {}",
                digest.len()
            )));
        }
        Self::new(code, digest)
    }

    /// Hex of the binary form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse from the hex of the binary form.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Multihash({}:{})", self.code, &hex[..hex.len().min(12)])
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Multihash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Multihash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Unsigned LEB128. Returns the value and the number of bytes consumed.
fn read_varint(bytes: &[u8]) -> Result<(u64, usize), TypeError> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().take(MAX_VARINT_LEN).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(TypeError::MalformedMultihash("truncated varint".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Multihash {
        Multihash::new(HashCode::Sha2_256, [0xabu8; 32]).unwrap()
    }

    #[test]
    fn binary_form_has_code_and_length_prefix() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes.len(), 34);
        assert_eq!(&bytes[..2], &[0x12, 0x20]);
    }

    #[test]
    fn parse_binary_form() {
        let mh = sample();
        assert_eq!(Multihash::from_bytes(&mh.to_bytes()).unwrap(), mh);
    }

    #[test]
    fn hex_form_starts_with_prefix() {
        assert!(sample().to_hex().starts_with("1220"));
        assert_eq!(Multihash::from_hex(&sample().to_hex()).unwrap(), sample());
    }

    #[test]
    fn unknown_code_rejected() {
        let err = Multihash::from_bytes(&[0x55, 0x01, 0x00]).unwrap_err();
        assert_eq!(err, TypeError::UnsupportedHash(0x55));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut bytes = sample().to_bytes();
        bytes.pop();
        assert!(matches!(
            Multihash::from_bytes(&bytes),
            Err(TypeError::MalformedMultihash(_))
        ));
    }

    #[test]
    fn empty_and_truncated_input_rejected() {
        assert!(Multihash::from_bytes(&[]).is_err());
        assert!(Multihash::from_bytes(&[0x12]).is_err());
        assert!(Multihash::from_bytes(&[0x92]).is_err());
    }

    #[test]
    fn empty_digest_rejected() {
        assert!(Multihash::new(HashCode::Sha2_256, Vec::new()).is_err());
        assert!(Multihash::from_bytes(&[0x12, 0x00]).is_err());
    }

    #[test]
    fn oversized_digest_rejected() {
        let err = Multihash::new(HashCode::Sha2_256, vec![0u8; 33]).unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 33 });
    }

    #[test]
    fn different_codes_never_collide() {
        let a = Multihash::new(HashCode::Sha2_256, [7u8; 32]).unwrap();
        let b = Multihash::new(HashCode::Blake3, [7u8; 32]).unwrap();
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn multi_byte_varint_roundtrip() {
        let mut out = Vec::new();
        write_varint(300, &mut out);
        assert_eq!(out, vec![0xac, 0x02]);
        assert_eq!(read_varint(&out).unwrap(), (300, 2));
    }

    #[test]
    fn serde_uses_hex() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert_eq!(json, format!("\"{}\"", sample().to_hex()));
        let parsed: Multihash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn hash_code_names() {
        assert_eq!(HashCode::default(), HashCode::Sha2_256);
        assert_eq!(HashCode::Blake3.to_string(), "blake3");
        let parsed: HashCode = serde_json::from_str("\"sha2-512\"").unwrap();
        assert_eq!(parsed, HashCode::Sha2_512);
    }
}
