//! Candidate sources
//!
//! A [`CandidateSource`] is a finite, ordered, restartable sequence of
//! [`Candidate`]s derived from a base wordlist. Extension, domain and port
//! composition are computed lazily from a single cursor position, so a
//! source over a large wordlist (or a large host range) never materialises
//! its full expansion.

use crate::error::{Result, SourceError};
use crate::types::Candidate;

use std::path::Path;
use tracing::debug;

/// How the domain suffix is applied to labels that already carry it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuffixPolicy {
    /// Always append `"." + domain`
    Always,
    /// Leave labels already ending in `"." + domain` (or equal to it) untouched
    #[default]
    SkipIfPresent,
}

/// Finite, ordered, restartable candidate sequence
#[derive(Debug, Clone)]
pub struct CandidateSource {
    words: Vec<String>,
    extensions: Vec<String>,
    domain: Option<String>,
    suffix_policy: SuffixPolicy,
    /// Each composed value is paired with every port, `value:port`
    ports: Vec<u16>,
    cursor: usize,
}

impl CandidateSource {
    /// Build a source over the given words with no composition
    pub fn from_words<I, S>(words: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::builder().words(words).build()
    }

    /// Load a wordlist file and build a source over it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder().words(load_wordlist(path)?).build()
    }

    /// Start building a source
    pub fn builder() -> CandidateSourceBuilder {
        CandidateSourceBuilder::default()
    }

    /// Produce the next candidate, or `None` once the sequence is exhausted
    pub fn next_candidate(&mut self) -> Option<Candidate> {
        // `self.len()` here would resolve to `ExactSizeIterator::len` on `&mut Self`
        if self.cursor >= CandidateSource::len(self) {
            return None;
        }

        let index = self.cursor;
        self.cursor += 1;

        let port_count = self.ports.len().max(1);
        let variant = index / port_count;
        let stride = self.extensions.len() + 1;
        let word = &self.words[variant / stride];
        let value = match variant % stride {
            0 => word.clone(),
            ext => format!("{}.{}", word, self.extensions[ext - 1]),
        };

        let value = self.compose(value);
        let value = match self.ports.get(index % port_count) {
            Some(port) if value.contains(':') => format!("[{}]:{}", value, port),
            Some(port) => format!("{}:{}", value, port),
            None => value,
        };
        Some(Candidate::new(index, value))
    }

    /// Restart the sequence from the first candidate
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Total number of candidates the source yields
    pub fn len(&self) -> usize {
        self.words.len() * (self.extensions.len() + 1) * self.ports.len().max(1)
    }

    /// Sources are never constructed empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Candidates not yet produced
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.cursor)
    }

    /// Number of base words
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    fn compose(&self, value: String) -> String {
        let Some(domain) = self.domain.as_deref() else {
            return value;
        };

        if self.suffix_policy == SuffixPolicy::SkipIfPresent {
            let already_qualified = value == domain
                || value
                    .strip_suffix(domain)
                    .map_or(false, |label| label.ends_with('.'));
            if already_qualified {
                return value;
            }
        }

        format!("{}.{}", value, domain)
    }
}

impl Iterator for CandidateSource {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_candidate()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = CandidateSource::remaining(self);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CandidateSource {}

/// Builder for [`CandidateSource`]
#[derive(Debug, Default)]
pub struct CandidateSourceBuilder {
    words: Vec<String>,
    extensions: Vec<String>,
    domain: Option<String>,
    suffix_policy: SuffixPolicy,
    ports: Vec<u16>,
}

impl CandidateSourceBuilder {
    /// Base words; blank entries are dropped and the rest trimmed
    pub fn words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.words.extend(words.into_iter().map(Into::into));
        self
    }

    /// Extensions, e.g. `["php", "html"]`; a leading dot is accepted
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions
            .extend(extensions.into_iter().map(Into::into));
        self
    }

    /// Compose every value with a domain (`label.domain`)
    pub fn domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn suffix_policy(mut self, policy: SuffixPolicy) -> Self {
        self.suffix_policy = policy;
        self
    }

    /// Pair every value with each port, host-major (`host:22`, `host:80`, ...)
    ///
    /// Duplicates are dropped, keeping first-seen order.
    pub fn ports<I: IntoIterator<Item = u16>>(mut self, ports: I) -> Self {
        self.ports.extend(ports);
        self
    }

    pub fn build(self) -> Result<CandidateSource> {
        let words: Vec<String> = self
            .words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        if words.is_empty() {
            return Err(SourceError::EmptyWordlist { path: None }.into());
        }

        let extensions = self
            .extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect::<Result<Vec<_>>>()?;

        let domain = self
            .domain
            .as_deref()
            .map(normalize_domain)
            .transpose()?;

        let mut ports = Vec::with_capacity(self.ports.len());
        for port in self.ports {
            if port == 0 {
                return Err(SourceError::InvalidPort { port }.into());
            }
            if !ports.contains(&port) {
                ports.push(port);
            }
        }

        debug!(
            words = words.len(),
            extensions = extensions.len(),
            domain = domain.as_deref().unwrap_or("-"),
            ports = ports.len(),
            "Candidate source constructed"
        );

        Ok(CandidateSource {
            words,
            extensions,
            domain,
            suffix_policy: self.suffix_policy,
            ports,
            cursor: 0,
        })
    }
}

/// Read a wordlist: lossy UTF-8, one word per line, trimmed, blanks dropped
pub fn load_wordlist<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| SourceError::UnreadableWordlist {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let words: Vec<String> = String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if words.is_empty() {
        return Err(SourceError::EmptyWordlist {
            path: Some(path.display().to_string()),
        }
        .into());
    }

    debug!(path = %path.display(), words = words.len(), "Wordlist loaded");
    Ok(words)
}

/// Reduce a domain argument to its lowercase host: scheme, path and trailing dots are dropped
pub fn normalize_domain(domain: &str) -> Result<String> {
    let trimmed = domain.trim();
    let without_scheme = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_matches('.')
        .to_ascii_lowercase();

    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(SourceError::InvalidDomain {
            domain: domain.to_string(),
        }
        .into());
    }
    Ok(host)
}

fn normalize_extension(extension: &str) -> Result<String> {
    let ext = extension.trim().trim_start_matches('.');
    if ext.is_empty() || ext.contains(char::is_whitespace) {
        return Err(SourceError::InvalidExtension {
            extension: extension.to_string(),
        }
        .into());
    }
    Ok(ext.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn values(source: CandidateSource) -> Vec<String> {
        source.map(Candidate::into_value).collect()
    }

    #[test]
    fn test_extension_expansion_order() {
        let source = CandidateSource::builder()
            .words(["admin"])
            .extensions(["php", "html"])
            .build()
            .unwrap();
        assert_eq!(values(source), vec!["admin", "admin.php", "admin.html"]);
    }

    #[test]
    fn test_expansion_across_words() {
        let source = CandidateSource::builder()
            .words(["a", "b"])
            .extensions([".txt"])
            .build()
            .unwrap();
        assert_eq!(source.len(), 4);
        assert_eq!(values(source), vec!["a", "a.txt", "b", "b.txt"]);
    }

    #[test]
    fn test_next_candidate_drains_every_word() {
        let mut source = CandidateSource::from_words(["a", "b", "c", "d", "e"]).unwrap();
        let mut seen = Vec::new();
        while let Some(candidate) = source.next_candidate() {
            seen.push(candidate.into_value());
        }
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(source.remaining(), 0);
        assert_eq!(source.len(), 5);
    }

    #[test]
    fn test_iterator_len_tracks_remaining() {
        let mut source = CandidateSource::from_words(["x", "y", "z"]).unwrap();
        source.next();
        assert_eq!(ExactSizeIterator::len(&source), 2);
        assert_eq!(source.len(), 3);
        assert_eq!(source.count(), 2);
    }

    #[test]
    fn test_port_composition_is_host_major() {
        let source = CandidateSource::builder()
            .words(["10.0.0.1", "10.0.0.2", "::1"])
            .ports([22, 80, 22])
            .build()
            .unwrap();
        assert_eq!(source.len(), 6);
        assert_eq!(source.ports(), &[22, 80]);
        assert_eq!(
            values(source),
            vec![
                "10.0.0.1:22",
                "10.0.0.1:80",
                "10.0.0.2:22",
                "10.0.0.2:80",
                "[::1]:22",
                "[::1]:80",
            ]
        );
    }

    #[test]
    fn test_large_port_product_is_not_materialised() {
        let hosts: Vec<String> = (0..65_534).map(|i| format!("10.0.{}.{}", i / 256, i % 256)).collect();
        let mut source = CandidateSource::builder()
            .words(hosts)
            .ports(1..=65_535)
            .build()
            .unwrap();
        assert_eq!(source.len(), 65_534 * 65_535);
        assert_eq!(source.next_candidate().unwrap().value(), "10.0.0.0:1");
        assert_eq!(source.next_candidate().unwrap().value(), "10.0.0.0:2");
    }

    #[test]
    fn test_zero_port_rejected() {
        let err = CandidateSource::builder()
            .words(["host"])
            .ports([0])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Source(SourceError::InvalidPort { port: 0 })));
    }

    #[test]
    fn test_candidate_indices_follow_source_order() {
        let source = CandidateSource::from_words(["x", "y", "z"]).unwrap();
        let indices: Vec<usize> = source.map(|c| c.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_wordlist_rejected() {
        let err = CandidateSource::from_words(["", "   "]).unwrap_err();
        assert!(matches!(
            err,
            Error::Source(SourceError::EmptyWordlist { .. })
        ));
        assert!(err.is_construction_error());
    }

    #[test]
    fn test_invalid_extension_rejected() {
        let err = CandidateSource::builder()
            .words(["admin"])
            .extensions(["php", " "])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Source(SourceError::InvalidExtension { .. })
        ));
    }

    #[test]
    fn test_domain_composition() {
        let source = CandidateSource::builder()
            .words(["www", "mail.example.com", "example.com"])
            .domain("https://Example.com/")
            .build()
            .unwrap();
        assert_eq!(
            values(source),
            vec!["www.example.com", "mail.example.com", "example.com"]
        );
    }

    #[test]
    fn test_domain_suffix_always() {
        let source = CandidateSource::builder()
            .words(["mail.example.com"])
            .domain("example.com")
            .suffix_policy(SuffixPolicy::Always)
            .build()
            .unwrap();
        assert_eq!(values(source), vec!["mail.example.com.example.com"]);
    }

    #[test]
    fn test_suffix_match_requires_label_boundary() {
        let source = CandidateSource::builder()
            .words(["notexample.com"])
            .domain("example.com")
            .build()
            .unwrap();
        assert_eq!(values(source), vec!["notexample.com.example.com"]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut source = CandidateSource::from_words(["one", "two"]).unwrap();
        assert_eq!(source.next_candidate().unwrap().value(), "one");
        assert_eq!(source.remaining(), 1);
        source.reset();
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.next_candidate().unwrap().value(), "one");
        assert_eq!(source.next_candidate().unwrap().value(), "two");
        assert!(source.next_candidate().is_none());
        assert!(source.next_candidate().is_none());
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("example.com").unwrap(), "example.com");
        assert_eq!(
            normalize_domain("http://sub.example.com/path?q=1").unwrap(),
            "sub.example.com"
        );
        assert!(normalize_domain("https://").is_err());
        assert!(normalize_domain("  ").is_err());
    }

    #[test]
    fn test_load_wordlist_trims_and_skips_blanks() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"  admin \n\n login\r\n\xffbad\n").unwrap();
        let words = load_wordlist(file.path()).unwrap();
        assert_eq!(words.len(), 3);
        assert_eq!(words[0], "admin");
        assert_eq!(words[1], "login");
        assert!(words[2].ends_with("bad"));
    }

    #[test]
    fn test_load_wordlist_errors() {
        let missing = load_wordlist("/nonexistent/probeforge/words.txt").unwrap_err();
        assert!(matches!(
            missing,
            Error::Source(SourceError::UnreadableWordlist { .. })
        ));

        let empty = NamedTempFile::new().unwrap();
        let err = CandidateSource::from_file(empty.path()).unwrap_err();
        assert!(matches!(
            err,
            Error::Source(SourceError::EmptyWordlist { path: Some(_) })
        ));
    }
}
