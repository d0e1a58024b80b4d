//! Page identifier extraction.
//!
//! Notion URLs carry the page id as 32 hex digits, either compact
//! (`.../My-Page-0123456789abcdef0123456789abcdef?pvs=4`) or already hyphenated
//! (`.../01234567-89ab-cdef-0123-456789abcdef`). The whole URL is scanned and the
//! first token delimited by non-hex characters wins; hyphens are only accepted at
//! the canonical 8-4-4-4-12 boundaries so a title slug ending in hex letters
//! (`Cafe-`, `Page-`) is never glued onto the id.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{ArchiveError, Result};

static PAGE_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^0-9a-f])([0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12})(?:$|[^0-9a-f])",
    )
    .expect("page id pattern is valid")
});

/// Canonical hyphenated page id, always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageIdentifier(String);

impl PageIdentifier {
    /// Hyphenated 8-4-4-4-12 form, as the Notion API expects it.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 32 hex digits without hyphens, as the export service expects it.
    pub fn compact(&self) -> String {
        dehyphenate(&self.0)
    }

    /// First 8 hex digits of the SHA-256 of the hyphenated id.
    pub fn short_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..8].to_string()
    }
}

impl fmt::Display for PageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Insert hyphens at 8/12/16/20 and lowercase. Anything but exactly 32 hex digits is
/// an [`ArchiveError::InvalidIdentifier`].
pub fn hyphenate(uuid32: &str) -> Result<String> {
    if uuid32.len() != 32 || !uuid32.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ArchiveError::InvalidIdentifier {
            input: uuid32.to_string(),
        });
    }
    let s = uuid32.to_ascii_lowercase();
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &s[..8],
        &s[8..12],
        &s[12..16],
        &s[16..20],
        &s[20..32]
    ))
}

pub fn dehyphenate(id: &str) -> String {
    id.replace('-', "").to_lowercase()
}

/// Pull the page id out of a pasted URL (or a bare id).
pub fn extract_page_id(url: &str) -> Result<PageIdentifier> {
    let token = PAGE_ID_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace('-', ""));

    match token.as_deref().map(hyphenate) {
        Some(Ok(hyphenated)) => {
            let id = PageIdentifier(hyphenated);
            tracing::debug!(url, page_id = %id, "Extracted page id");
            Ok(id)
        }
        _ => {
            tracing::error!(url, "No page id found in input");
            Err(ArchiveError::InvalidIdentifier {
                input: url.to_string(),
            })
        }
    }
}
