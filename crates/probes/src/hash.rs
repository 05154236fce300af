//! Offline hash comparison probe

use crate::common::ProbeError;

use md4::Md4;
use md5::Md5;
use probeforge_core::{Candidate, Outcome, Payload, Probe};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    /// MD4 over the UTF-16LE encoding of the input
    Ntlm,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 7] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
        HashAlgorithm::Ntlm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Ntlm => "ntlm",
        }
    }

    /// Length of the hex digest
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 | HashAlgorithm::Ntlm => 32,
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha224 => 56,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 => 96,
            HashAlgorithm::Sha512 => 128,
        }
    }

    /// Lowercase hex digest of `input`
    pub fn digest(&self, input: &str) -> String {
        let bytes = input.as_bytes();
        match self {
            HashAlgorithm::Md5 => hex::encode(Md5::digest(bytes)),
            HashAlgorithm::Sha1 => hex::encode(Sha1::digest(bytes)),
            HashAlgorithm::Sha224 => hex::encode(Sha224::digest(bytes)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            HashAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
            HashAlgorithm::Ntlm => {
                let utf16: Vec<u8> = input.encode_utf16().flat_map(u16::to_le_bytes).collect();
                hex::encode(Md4::digest(&utf16))
            }
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase().replace('-', "");
        HashAlgorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.as_str() == name)
            .ok_or_else(|| ProbeError::Unsupported(format!("hash algorithm {s}")))
    }
}

/// Compares each candidate's digest with a target hash
#[derive(Debug, Clone)]
pub struct HashProbe {
    algorithm: HashAlgorithm,
    target: String,
}

impl HashProbe {
    /// The target must be a hex digest of the algorithm's length
    pub fn new(algorithm: HashAlgorithm, target: &str) -> Result<Self, ProbeError> {
        let target = target.trim().to_ascii_lowercase();
        if target.len() != algorithm.hex_len() || !target.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ProbeError::InvalidTarget(format!(
                "{target} is not a {algorithm} digest"
            )));
        }
        Ok(Self { algorithm, target })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether `word` hashes to the target
    pub fn matches(&self, word: &str) -> bool {
        self.algorithm.digest(word).eq_ignore_ascii_case(&self.target)
    }
}

impl Probe for HashProbe {
    async fn probe(&self, candidate: &Candidate, _timeout: Option<Duration>) -> Outcome {
        if self.matches(candidate.value()) {
            Outcome::Success(
                Payload::new(format!("{} -> {}", self.target, candidate.value()))
                    .with_metadata("algorithm", self.algorithm.as_str()),
            )
        } else {
            Outcome::hard_reject("mismatch")
        }
    }
}
