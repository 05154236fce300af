//! Hash type identification
//!
//! Pattern matching only: several formats share a shape (MD5 and NTLM are
//! both 32 hex characters), so identification returns every candidate type.

use crate::common::ProbeError;
use crate::hash::HashAlgorithm;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

static HASH_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("MD5", r"^[a-f0-9]{32}$"),
        ("SHA-1", r"^[a-f0-9]{40}$"),
        ("SHA-256", r"^[a-f0-9]{64}$"),
        ("SHA-512", r"^[a-f0-9]{128}$"),
        ("bcrypt", r"^\$2[aby]\$\d+\$[./A-Za-z0-9]{53}$"),
        ("NTLM", r"^[a-f0-9]{32}$"),
        ("MySQL", r"^[a-f0-9]{40}$"),
        ("CRC32", r"^[a-f0-9]{8}$"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .ok()
            .map(|regex| (name, regex))
    })
    .collect()
});

static HEX_ONLY: Lazy<Option<Regex>> = Lazy::new(|| {
    RegexBuilder::new(r"^[a-f0-9]+$")
        .case_insensitive(true)
        .build()
        .ok()
});

/// Result of analysing one hash string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashAnalysis {
    pub hash: String,
    pub length: usize,
    pub hex_only: bool,
    /// Matching types in table order; empty when unidentified
    pub candidates: Vec<&'static str>,
}

impl HashAnalysis {
    pub fn is_identified(&self) -> bool {
        !self.candidates.is_empty()
    }
}

/// Names of every type whose pattern matches `hash`
pub fn identify(hash: &str) -> Vec<&'static str> {
    HASH_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(hash))
        .map(|(name, _)| *name)
        .collect()
}

/// Identify `hash` and describe its shape
pub fn analyze(hash: &str) -> HashAnalysis {
    let hash = hash.trim();
    HashAnalysis {
        hash: hash.to_string(),
        length: hash.chars().count(),
        hex_only: HEX_ONLY.as_ref().is_some_and(|hex| hex.is_match(hash)),
        candidates: identify(hash),
    }
}

/// Hex digest of `text` with the named algorithm
pub fn generate(text: &str, algorithm: &str) -> Result<String, ProbeError> {
    let algorithm: HashAlgorithm = algorithm.parse()?;
    Ok(algorithm.digest(text))
}
