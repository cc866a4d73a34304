use std::fmt;
use std::str::FromStr;

use base64::Engine;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::BlobError;

/// Digest used to compute blob etags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Canonical name, e.g. `SHA-256`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Start an incremental digest computation
    pub fn digester(&self) -> Digester {
        match self {
            Self::Sha1 => Digester::Sha1(Sha1::new()),
            Self::Sha256 => Digester::Sha256(Sha256::new()),
            Self::Sha512 => Digester::Sha512(Sha512::new()),
        }
    }

    /// Etag of a complete in-memory payload
    pub fn etag_of(&self, data: &[u8]) -> String {
        let mut digester = self.digester();
        digester.update(data);
        digester.finish_etag()
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = BlobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(BlobError::invalid(format!("Unsupported digest algorithm: {}", s))),
        }
    }
}

impl TryFrom<String> for DigestAlgorithm {
    type Error = BlobError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DigestAlgorithm> for String {
    fn from(algorithm: DigestAlgorithm) -> Self {
        algorithm.name().to_string()
    }
}

/// Incremental digest over streamed chunks
pub enum Digester {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha512(Sha512),
}

impl Digester {
    pub fn update(&mut self, chunk: &[u8]) {
        match self {
            Self::Sha1(d) => d.update(chunk),
            Self::Sha256(d) => d.update(chunk),
            Self::Sha512(d) => d.update(chunk),
        }
    }

    /// Finish and return the digest as standard base64
    pub fn finish_etag(self) -> String {
        let digest = match self {
            Self::Sha1(d) => d.finalize().to_vec(),
            Self::Sha256(d) => d.finalize().to_vec(),
            Self::Sha512(d) => d.finalize().to_vec(),
        };
        base64::engine::general_purpose::STANDARD.encode(digest)
    }
}
