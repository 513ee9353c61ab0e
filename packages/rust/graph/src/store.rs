//! JSONL node/edge files with fresh, merge and append write modes.
//!
//! Every write happens under an exclusive `.graph.lock` file in the output
//! directory, so two exports can never interleave a read-modify-write.

use std::collections::{BTreeMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use policygraph_shared::{ExportMode, PolicyGraphError, Result};

use crate::records::RecordLine;

pub const NODES_FILE: &str = "nodes.jsonl";
pub const EDGES_FILE: &str = "edges.jsonl";
pub const LOCK_FILE: &str = ".graph.lock";

/// Totals describe the persisted files after the run; `new_*` what this
/// run added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportCounts {
    pub nodes: usize,
    pub edges: usize,
    pub node_types: BTreeMap<String, usize>,
    pub edge_types: BTreeMap<String, usize>,
    pub new_nodes: usize,
    pub new_edges: usize,
}

/// What one file looks like after a write.
#[derive(Debug, Default)]
struct FileOutcome {
    total: usize,
    types: BTreeMap<String, usize>,
    added: usize,
}

/// The only fields read back from existing lines.
#[derive(Deserialize)]
struct RecordHeader {
    id: String,
    #[serde(rename = "type")]
    kind: String,
}

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

/// Exclusive writer lock; the lock file is removed on drop.
#[derive(Debug)]
pub struct GraphLock {
    path: PathBuf,
}

impl GraphLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // Best effort: the pid only helps a human clear a stale lock.
                let _ = writeln!(file, "{}", std::process::id());
                debug!(path = %path.display(), "acquired graph lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(PolicyGraphError::Storage(format!(
                "graph output is locked by another export (remove {} if no export is running)",
                path.display()
            ))),
            Err(e) => Err(PolicyGraphError::io(&path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for GraphLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove graph lock");
        }
    }
}

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

/// The pair of JSONL files under one output directory.
#[derive(Debug, Clone)]
pub struct GraphStore {
    dir: PathBuf,
}

impl GraphStore {
    /// Open (and create) the output directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| PolicyGraphError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn nodes_path(&self) -> PathBuf {
        self.dir.join(NODES_FILE)
    }

    pub fn edges_path(&self) -> PathBuf {
        self.dir.join(EDGES_FILE)
    }

    pub fn lock(&self) -> Result<GraphLock> {
        GraphLock::acquire(&self.dir)
    }

    /// Persist both record sets. The caller must hold the [`GraphLock`].
    pub fn write(
        &self,
        _lock: &GraphLock,
        mode: ExportMode,
        nodes: &[RecordLine],
        edges: &[RecordLine],
    ) -> Result<ExportCounts> {
        let node_outcome = persist(&self.nodes_path(), mode, nodes)?;
        let edge_outcome = persist(&self.edges_path(), mode, edges)?;

        let counts = ExportCounts {
            nodes: node_outcome.total,
            edges: edge_outcome.total,
            node_types: node_outcome.types,
            edge_types: edge_outcome.types,
            new_nodes: node_outcome.added,
            new_edges: edge_outcome.added,
        };

        info!(
            %mode,
            nodes = counts.nodes,
            edges = counts.edges,
            new_nodes = counts.new_nodes,
            new_edges = counts.new_edges,
            "graph files written"
        );
        Ok(counts)
    }

    /// Existing records of one file; missing file means none.
    pub fn read_records(path: &Path) -> Result<Vec<RecordLine>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PolicyGraphError::io(path, e)),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| PolicyGraphError::io(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let header: RecordHeader = serde_json::from_str(&line).map_err(|e| {
                PolicyGraphError::Storage(format!(
                    "{}:{}: malformed record: {e}",
                    path.display(),
                    index + 1
                ))
            })?;
            records.push(RecordLine {
                id: header.id,
                kind: header.kind,
                line,
            });
        }
        Ok(records)
    }
}

fn persist(path: &Path, mode: ExportMode, records: &[RecordLine]) -> Result<FileOutcome> {
    match mode {
        ExportMode::Fresh => {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed previous graph file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(PolicyGraphError::io(path, e)),
            }
            write_atomic(path, records.iter())?;
            Ok(outcome(&[], records, records.len()))
        }
        ExportMode::Merge => {
            let existing = GraphStore::read_records(path)?;
            let mut ids: HashSet<&str> = existing.iter().map(|r| r.id.as_str()).collect();
            let added: Vec<&RecordLine> = records.iter().filter(|r| ids.insert(&r.id)).collect();
            write_atomic(path, existing.iter().chain(added.iter().copied()))?;
            let added: Vec<RecordLine> = added.into_iter().cloned().collect();
            Ok(outcome(&existing, &added, added.len()))
        }
        ExportMode::Append => {
            let existing = GraphStore::read_records(path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| PolicyGraphError::io(path, e))?;
            let mut writer = BufWriter::new(file);
            for record in records {
                writeln!(writer, "{}", record.line).map_err(|e| PolicyGraphError::io(path, e))?;
            }
            writer.flush().map_err(|e| PolicyGraphError::io(path, e))?;
            Ok(outcome(&existing, records, records.len()))
        }
    }
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic<'a>(path: &Path, records: impl Iterator<Item = &'a RecordLine>) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    let file = File::create(&temp).map_err(|e| PolicyGraphError::io(&temp, e))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        writeln!(writer, "{}", record.line).map_err(|e| PolicyGraphError::io(&temp, e))?;
    }
    writer.flush().map_err(|e| PolicyGraphError::io(&temp, e))?;
    drop(writer);

    std::fs::rename(&temp, path).map_err(|e| PolicyGraphError::io(path, e))?;
    debug!(path = %path.display(), "wrote graph file");
    Ok(())
}

fn outcome(existing: &[RecordLine], added: &[RecordLine], added_count: usize) -> FileOutcome {
    let mut types = BTreeMap::new();
    for record in existing.iter().chain(added) {
        *types.entry(record.kind.clone()).or_insert(0) += 1;
    }
    FileOutcome {
        total: existing.len() + added.len(),
        types,
        added: added_count,
    }
}
