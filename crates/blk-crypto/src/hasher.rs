use blk_types::{HashCode, Multihash};
use sha2::{Digest, Sha256, Sha512};

/// Self-describing content hasher.
///
/// Each hasher is bound to one algorithm and produces a [`Multihash`] whose
/// prefix names that algorithm, so digests from different algorithms never
/// collide in encoded form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    code: HashCode,
}

impl ContentHasher {
    /// SHA2-256, the default for new blocks.
    pub const SHA2_256: Self = Self {
        code: HashCode::Sha2_256,
    };
    pub const SHA2_512: Self = Self {
        code: HashCode::Sha2_512,
    };
    pub const BLAKE3: Self = Self {
        code: HashCode::Blake3,
    };

    pub const fn new(code: HashCode) -> Self {
        Self { code }
    }

    /// Hash raw bytes.
    pub fn hash(&self, data: &[u8]) -> Multihash {
        let digest = Self::raw_hash(self.code, data);
        // Full-length output of a supported algorithm is always a valid digest.
        match Multihash::new(self.code, digest) {
            Ok(mh) => mh,
            Err(e) => unreachable!("{} produced an invalid digest: {e}", self.code),
        }
    }

    /// Recompute `data`'s digest with the algorithm named by `expected`.
    ///
    /// Truncated digests are compared against the same-length prefix.
    pub fn verify(data: &[u8], expected: &Multihash) -> bool {
        let full = Self::raw_hash(expected.code(), data);
        full.get(..expected.digest().len()) == Some(expected.digest())
    }

    /// Unprefixed digest bytes.
    pub fn raw_hash(code: HashCode, data: &[u8]) -> Vec<u8> {
        match code {
            HashCode::Sha2_256 => Sha256::digest(data).to_vec(),
            HashCode::Sha2_512 => Sha512::digest(data).to_vec(),
            HashCode::Blake3 => blake3::hash(data).as_bytes().to_vec(),
        }
    }

    pub fn code(&self) -> HashCode {
        self.code
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::SHA2_256
    }
}

impl From<HashCode> for ContentHasher {
    fn from(code: HashCode) -> Self {
        Self::new(code)
    }
}
