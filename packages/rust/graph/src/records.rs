//! Persisted node and edge records.
//!
//! One JSON object per line. Nodes carry a `type` tag (`PAGE`, `SECTION`,
//! `CHUNK`); optional fields are omitted rather than written as `null`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use policygraph_shared::{Platform, Result, Source};

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Page,
    Section,
    Chunk,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "PAGE",
            Self::Section => "SECTION",
            Self::Chunk => "CHUNK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    PageContainsSection,
    SectionContainsChunk,
    NextChunk,
    PageLinksToPage,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageContainsSection => "PAGE_CONTAINS_SECTION",
            Self::SectionContainsChunk => "SECTION_CONTAINS_CHUNK",
            Self::NextChunk => "NEXT_CHUNK",
            Self::PageLinksToPage => "PAGE_LINKS_TO_PAGE",
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: String,
    pub url: String,
    pub title: String,
    pub locale: String,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub platforms: BTreeSet<Platform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionNode {
    pub id: String,
    pub url: String,
    pub heading: String,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub platforms: BTreeSet<Platform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkNode {
    pub id: String,
    pub url: String,
    pub heading: String,
    /// Position within the containing section, from 0.
    pub order: usize,
    pub text: String,
    pub page_title: String,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieved_at: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub platforms: BTreeSet<Platform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Node {
    Page(PageNode),
    Section(SectionNode),
    Chunk(ChunkNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Self::Page(n) => &n.id,
            Self::Section(n) => &n.id,
            Self::Chunk(n) => &n.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Page(_) => NodeKind::Page,
            Self::Section(_) => NodeKind::Section,
            Self::Chunk(_) => NodeKind::Chunk,
        }
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub source: String,
    pub target: String,
}

// ---------------------------------------------------------------------------
// Serialized lines
// ---------------------------------------------------------------------------

/// A record as written to disk: its id, type tag and JSON line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLine {
    pub id: String,
    pub kind: String,
    pub line: String,
}

impl RecordLine {
    pub fn from_node(node: &Node) -> Result<Self> {
        Ok(Self {
            id: node.id().to_string(),
            kind: node.kind().as_str().to_string(),
            line: serde_json::to_string(node)?,
        })
    }

    pub fn from_edge(edge: &Edge) -> Result<Self> {
        Ok(Self {
            id: edge.id.clone(),
            kind: edge.kind.as_str().to_string(),
            line: serde_json::to_string(edge)?,
        })
    }
}
