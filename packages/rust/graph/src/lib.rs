//! Deterministic, content-addressed knowledge graph export.
//!
//! Pages become PAGE, SECTION and CHUNK nodes joined by containment,
//! reading-order and link edges, persisted as newline-delimited JSON.

pub mod export;
pub mod ids;
pub mod records;
pub mod split;
pub mod store;

pub use export::{ExportOptions, Graph, RETRIEVED_AT_FORMAT, build_graph, export};
pub use records::{ChunkNode, Edge, EdgeKind, Node, NodeKind, PageNode, RecordLine, SectionNode};
pub use split::{TextPiece, split_text};
pub use store::{EDGES_FILE, ExportCounts, GraphLock, GraphStore, LOCK_FILE, NODES_FILE};
