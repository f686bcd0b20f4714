//! Content-addressed cache keys.
//!
//! A [`ContentKey`] is a pure function of `(kind, language, payload)`:
//! the digest is MD5 over `"{language}:{payload}"` where the language code is
//! trimmed and lower-cased and the payload is hashed verbatim. Whitespace
//! differences in the payload therefore produce different keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Payload class addressed by a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    Tts,
    Qa,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Tts => "tts",
            ContentKind::Qa => "qa",
        }
    }

    /// Default time-to-live of cached values of this kind.
    ///
    /// Answers live shorter than audio because override rules and prompts evolve.
    pub fn default_ttl(&self) -> Duration {
        match self {
            ContentKind::Tts => Duration::from_secs(86_400),
            ContentKind::Qa => Duration::from_secs(3_600),
        }
    }
}

/// Deterministic fingerprint of a request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    kind: ContentKind,
    language: String,
    digest: [u8; 16],
}

impl ContentKey {
    pub fn derive(kind: ContentKind, language: &str, payload: &str) -> Self {
        let language = language.trim().to_lowercase();
        let material = format!("{}:{}", language, payload);
        let digest = md5::compute(material.as_bytes());
        Self {
            kind,
            language,
            digest: digest.0,
        }
    }

    /// Key for synthesized speech of `text`.
    pub fn tts(language: &str, text: &str) -> Self {
        Self::derive(ContentKind::Tts, language, text)
    }

    /// Key for an answer to `question` asked on slide `slide_id`.
    pub fn qa(language: &str, slide_id: u32, question: &str) -> Self {
        Self::derive(ContentKind::Qa, language, &format!("{}:{}", slide_id, question))
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn digest(&self) -> &[u8; 16] {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        self.digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Storage key used by cache backends: `{kind}:{language}:{hex}`.
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.kind.as_str(),
            self.language,
            self.digest_hex()
        )
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
