//! Content-addressed record identifiers.
//!
//! Every id is the SHA-256 hex digest of its key fields joined by U+001F, so
//! the same input always produces the same id and field boundaries cannot be
//! forged by content.

use sha2::{Digest, Sha256};

use crate::records::{EdgeKind, NodeKind};

const FIELD_SEPARATOR: &str = "\u{1f}";

/// Hex SHA-256 of `parts` joined by the field separator.
pub fn content_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join(FIELD_SEPARATOR).as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn page_id(url: &str) -> String {
    content_id(&[NodeKind::Page.as_str(), url])
}

pub fn section_id(url: &str, heading: &str) -> String {
    content_id(&[NodeKind::Section.as_str(), url, heading])
}

/// Chunk ids cover the text hash, so edited text yields a new chunk.
pub fn chunk_id(url: &str, heading: &str, order: usize, text: &str) -> String {
    let order = order.to_string();
    let hash = text_hash(text);
    content_id(&[NodeKind::Chunk.as_str(), url, heading, &order, &hash])
}

pub fn edge_id(kind: EdgeKind, source: &str, target: &str) -> String {
    content_id(&[kind.as_str(), source, target])
}
