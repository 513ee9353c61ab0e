//! Turns crawled pages into PAGE/SECTION/CHUNK nodes and their edges, then
//! persists them through the [`GraphStore`].

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use url::Url;

use policygraph_shared::{ExportConfig, ExportMode, PageData, Result};

use crate::ids::{chunk_id, edge_id, page_id, section_id};
use crate::records::{ChunkNode, Edge, EdgeKind, Node, PageNode, RecordLine, SectionNode};
use crate::split::{split_text, validate_split_options};
use crate::store::{ExportCounts, GraphStore};

/// Timestamp format written to `retrieved_at`.
pub const RETRIEVED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Options for one export run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    pub max_chunk_chars: usize,
    pub overlap_chars: usize,
    pub mode: ExportMode,
    /// Stamped on every node when set.
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl From<&ExportConfig> for ExportOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            out_dir: config.out_dir.clone(),
            max_chunk_chars: config.max_chunk_chars,
            overlap_chars: config.overlap_chars,
            mode: config.mode,
            retrieved_at: None,
        }
    }
}

/// In-memory graph for one batch of pages, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Build the graph for `pages` and write it to `options.out_dir`.
#[instrument(skip_all, fields(pages = pages.len(), out_dir = %options.out_dir.display(), mode = %options.mode))]
pub fn export(pages: &[PageData], options: &ExportOptions) -> Result<ExportCounts> {
    let retrieved_at = options
        .retrieved_at
        .map(|t| t.format(RETRIEVED_AT_FORMAT).to_string());
    let graph = build_graph(
        pages,
        options.max_chunk_chars,
        options.overlap_chars,
        retrieved_at.as_deref(),
    )?;

    let nodes = graph
        .nodes
        .iter()
        .map(RecordLine::from_node)
        .collect::<Result<Vec<_>>>()?;
    let edges = graph
        .edges
        .iter()
        .map(RecordLine::from_edge)
        .collect::<Result<Vec<_>>>()?;

    let store = GraphStore::open(&options.out_dir)?;
    let lock = store.lock()?;
    let counts = store.write(&lock, options.mode, &nodes, &edges)?;

    info!(
        nodes = counts.nodes,
        edges = counts.edges,
        new_nodes = counts.new_nodes,
        new_edges = counts.new_edges,
        "export complete"
    );
    Ok(counts)
}

// ---------------------------------------------------------------------------
// Graph building
// ---------------------------------------------------------------------------

/// Accumulates records, dropping any whose id was already emitted.
#[derive(Default)]
struct GraphBuilder {
    graph: Graph,
    node_ids: HashSet<String>,
    edge_ids: HashSet<String>,
}

impl GraphBuilder {
    fn node(&mut self, node: Node) {
        if self.node_ids.insert(node.id().to_string()) {
            self.graph.nodes.push(node);
        }
    }

    fn edge(&mut self, kind: EdgeKind, source: &str, target: &str) {
        let id = edge_id(kind, source, target);
        if self.edge_ids.insert(id.clone()) {
            self.graph.edges.push(Edge {
                id,
                kind,
                source: source.to_string(),
                target: target.to_string(),
            });
        }
    }
}

/// Per-section state within one page.
struct SectionState {
    id: String,
    next_order: usize,
    last_chunk: Option<String>,
}

/// Build nodes and edges for `pages` without touching the filesystem.
pub fn build_graph(
    pages: &[PageData],
    max_chunk_chars: usize,
    overlap_chars: usize,
    retrieved_at: Option<&str>,
) -> Result<Graph> {
    validate_split_options(max_chunk_chars, overlap_chars)?;

    // A link may name a page by its frontier key or by where it redirected.
    let mut by_url: HashMap<&str, String> = HashMap::new();
    for page in pages {
        let id = page_id(&page.url);
        by_url.entry(page.url.as_str()).or_insert_with(|| id.clone());
        by_url.entry(page.final_url.as_str()).or_insert(id);
    }

    let mut builder = GraphBuilder::default();
    let retrieved_at = retrieved_at.map(str::to_string);

    for page in pages {
        let pid = page_id(&page.url);
        let locale = Url::parse(&page.url)
            .map(|u| page.source.infer_locale(&u))
            .unwrap_or_else(|_| "unknown".to_string());

        builder.node(Node::Page(PageNode {
            id: pid.clone(),
            url: page.url.clone(),
            title: page.title.clone(),
            locale,
            source: page.source,
            retrieved_at: retrieved_at.clone(),
            platforms: page.platforms.clone(),
        }));

        let mut sections: HashMap<&str, SectionState> = HashMap::new();
        for span in &page.chunks {
            let pieces = split_text(&span.text, max_chunk_chars, overlap_chars)?;
            if pieces.is_empty() {
                continue;
            }

            let heading = span.heading.as_str();
            let section = sections.entry(heading).or_insert_with(|| SectionState {
                id: section_id(&page.url, heading),
                next_order: 0,
                last_chunk: None,
            });

            builder.node(Node::Section(SectionNode {
                id: section.id.clone(),
                url: page.url.clone(),
                heading: heading.to_string(),
                source: page.source,
                retrieved_at: retrieved_at.clone(),
                platforms: page.platforms.clone(),
            }));
            builder.edge(EdgeKind::PageContainsSection, &pid, &section.id);

            for piece in pieces {
                let order = section.next_order;
                section.next_order += 1;
                let cid = chunk_id(&page.url, heading, order, &piece.text);

                builder.node(Node::Chunk(ChunkNode {
                    id: cid.clone(),
                    url: page.url.clone(),
                    heading: heading.to_string(),
                    order,
                    text: piece.text,
                    page_title: page.title.clone(),
                    source: page.source,
                    retrieved_at: retrieved_at.clone(),
                    platforms: page.platforms.clone(),
                }));
                builder.edge(EdgeKind::SectionContainsChunk, &section.id, &cid);
                if let Some(prev) = section.last_chunk.replace(cid.clone()) {
                    builder.edge(EdgeKind::NextChunk, &prev, &cid);
                }
            }
        }

        for link in &page.out_links {
            if let Some(target) = by_url.get(link.as_str()) {
                builder.edge(EdgeKind::PageLinksToPage, &pid, target);
            }
        }

        debug!(url = %page.url, sections = sections.len(), "page graph built");
    }

    Ok(builder.graph)
}
