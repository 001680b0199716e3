//! Content hashing and content keys.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use sha2::{Digest, Sha512};
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

/// SHA-512 digest size in bytes.
pub const SHA512_SIZE: usize = 64;

/// BLAKE3 digest size in bytes.
pub const BLAKE3_SIZE: usize = 32;

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// SHA-512, 512-bit output.
    #[default]
    Sha512,
    /// BLAKE3 with 256-bit output.
    Blake3,
}

impl Algorithm {
    /// Returns the string representation of the algorithm (for flags and logs).
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha512 => "sha512",
            Algorithm::Blake3 => "blake3",
        }
    }

    /// Parse algorithm from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "sha512" => Ok(Algorithm::Sha512),
            "blake3" => Ok(Algorithm::Blake3),
            _ => Err(Error::unsupported_algorithm(s)),
        }
    }

    /// Digest size in bytes.
    pub fn digest_size(&self) -> usize {
        match self {
            Algorithm::Sha512 => SHA512_SIZE,
            Algorithm::Blake3 => BLAKE3_SIZE,
        }
    }

    /// Hash raw bytes.
    pub fn hash_bytes(&self, data: &[u8]) -> Hash {
        match self {
            Algorithm::Sha512 => Hash::sha512_from_slice(&Sha512::digest(data)),
            Algorithm::Blake3 => Hash::Blake3(*blake3::hash(data).as_bytes()),
        }
    }

    /// Hash everything a reader yields.
    ///
    /// Returns the digest together with the number of bytes consumed.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> io::Result<(Hash, u64)> {
        match self {
            Algorithm::Sha512 => {
                let mut hasher = Sha512::new();
                let len = io::copy(&mut reader, &mut hasher)?;
                Ok((Hash::sha512_from_slice(&hasher.finalize()), len))
            }
            Algorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                let len = io::copy(&mut reader, &mut hasher)?;
                Ok((Hash::Blake3(*hasher.finalize().as_bytes()), len))
            }
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::parse(s)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A content digest. Equal digests mean bit-identical content.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hash {
    Sha512([u8; SHA512_SIZE]),
    Blake3([u8; BLAKE3_SIZE]),
}

impl Hash {
    fn sha512_from_slice(digest: &[u8]) -> Self {
        let mut bytes = [0u8; SHA512_SIZE];
        bytes.copy_from_slice(digest);
        Hash::Sha512(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Hash::Sha512(bytes) => bytes,
            Hash::Blake3(bytes) => bytes,
        }
    }

    /// The algorithm that produced this digest.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Hash::Sha512(_) => Algorithm::Sha512,
            Hash::Blake3(_) => Algorithm::Blake3,
        }
    }

    /// URL-safe base64 rendering, used as the blob's file name in the archive.
    pub fn to_key(&self) -> String {
        URL_SAFE.encode(self.as_bytes())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}:{})", self.algorithm(), self.to_hex())
    }
}
