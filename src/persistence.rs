use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geometry::Rect;
use crate::model::{FeatureSnapshot, GraphData, GraphEdge, GraphNode, Pin, pin_records};
use crate::storage::{KeyValueStore, MemoryStore, StorageError};

// ── Storage keys ────────────────────────────────────────────────────
/// Full document in the local store.
pub const GRAPH_KEY: &str = "wirepath-graph";
/// Nodes-only array in the local store, read when no full document exists.
pub const NODES_KEY: &str = "wirepath-nodes";
pub const GRAPH_SESSION_KEY: &str = "wirepath-graph-session";
pub const NODES_SESSION_KEY: &str = "wirepath-nodes-session";
/// Normal-mode snapshot taken while another mode owns the canvas.
pub const NORMAL_BACKUP_KEY: &str = "wirepath-normal-mode-backup";

const OWNED_KEYS: [&str; 5] = [
    GRAPH_KEY,
    NODES_KEY,
    GRAPH_SESSION_KEY,
    NODES_SESSION_KEY,
    NORMAL_BACKUP_KEY,
];

const LOCAL_GRAPH_NAME: &str = "Untitled Graph";
const BACKUP_GRAPH_NAME: &str = "Normal Mode Backup";

static BUILTIN_NODES: Lazy<Vec<GraphNode>> = Lazy::new(|| {
    vec![
        GraphNode::new("power", "power", Rect::new(100.0, 150.0, 80.0, 60.0), "9V Battery")
            .with_pins(vec![Pin::new("+9V", 80.0, 20.0), Pin::new("GND", 80.0, 40.0)]),
        GraphNode::new("reg", "ic", Rect::new(250.0, 150.0, 60.0, 40.0), "LM7805").with_pins(vec![
            Pin::new("IN", 0.0, 20.0),
            Pin::new("GND", 30.0, 40.0),
            Pin::new("OUT", 60.0, 20.0),
        ]),
        GraphNode::new("mic1", "component", Rect::new(100.0, 250.0, 40.0, 40.0), "MIC1")
            .with_pins(vec![Pin::new("OUT", 40.0, 20.0), Pin::new("GND", 20.0, 40.0)]),
        GraphNode::new("r1", "resistor", Rect::new(180.0, 270.0, 60.0, 20.0), "10kΩ")
            .with_pins(vec![Pin::new("A", 0.0, 10.0), Pin::new("B", 60.0, 10.0)]),
        GraphNode::new("amp1", "ic", Rect::new(300.0, 230.0, 80.0, 60.0), "LM386").with_pins(vec![
            Pin::new("GAIN", 0.0, 15.0),
            Pin::new("-IN", 0.0, 30.0),
            Pin::new("+IN", 0.0, 45.0),
            Pin::new("GND", 20.0, 60.0),
            Pin::new("VCC", 40.0, 60.0),
            Pin::new("BYP", 60.0, 60.0),
            Pin::new("OUT", 80.0, 45.0),
            Pin::new("VS", 80.0, 15.0),
        ]),
    ]
});

/// The diagram shown when nothing has been saved and no default file loads.
pub fn builtin_nodes() -> Vec<GraphNode> {
    BUILTIN_NODES.clone()
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid graph document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Session,
    Local,
    DefaultFile,
    Builtin,
}

impl fmt::Display for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadSource::Session => "session storage",
            LoadSource::Local => "local storage",
            LoadSource::DefaultFile => "default file",
            LoadSource::Builtin => "built-in diagram",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub source: LoadSource,
}

pub fn parse_document(json: &str) -> Result<GraphData, PersistenceError> {
    Ok(serde_json::from_str(json)?)
}

pub fn read_document(path: &Path) -> Result<GraphData, PersistenceError> {
    let contents = std::fs::read_to_string(path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(&contents)
}

pub fn write_document(path: &Path, data: &GraphData) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Graph storage across a session store and a local store.
///
/// Loading walks session storage, local storage, the default document and
/// finally the built-in diagram, taking the first tier that yields a graph.
/// Saving always writes both stores so a new session picks up the latest
/// edit from local storage.
pub struct Persistence {
    session: Box<dyn KeyValueStore>,
    local: Box<dyn KeyValueStore>,
    default_file: Option<PathBuf>,
}

impl Persistence {
    pub fn new(session: Box<dyn KeyValueStore>, local: Box<dyn KeyValueStore>) -> Self {
        Self {
            session,
            local,
            default_file: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    }

    pub fn with_default_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_file = Some(path.into());
        self
    }

    pub fn session(&self) -> &dyn KeyValueStore {
        self.session.as_ref()
    }

    pub fn local(&self) -> &dyn KeyValueStore {
        self.local.as_ref()
    }

    pub fn load_with_priority(&self) -> LoadedGraph {
        let tiers = [
            (self.session.as_ref(), GRAPH_SESSION_KEY, NODES_SESSION_KEY, LoadSource::Session),
            (self.local.as_ref(), GRAPH_KEY, NODES_KEY, LoadSource::Local),
        ];
        for (store, graph_key, nodes_key, source) in tiers {
            if let Some((nodes, edges)) = load_tier(store, graph_key, nodes_key, source) {
                info!(%source, nodes = nodes.len(), edges = edges.len(), "loaded graph");
                return LoadedGraph {
                    nodes,
                    edges,
                    source,
                };
            }
        }

        if let Some(path) = &self.default_file {
            match read_document(path) {
                Ok(data) => {
                    let (nodes, edges) = data.into_parts();
                    info!(path = %path.display(), nodes = nodes.len(), "loaded default graph file");
                    return LoadedGraph {
                        nodes,
                        edges,
                        source: LoadSource::DefaultFile,
                    };
                }
                Err(err) => warn!(path = %path.display(), "default graph unavailable: {err}"),
            }
        }

        info!("using built-in diagram");
        LoadedGraph {
            nodes: builtin_nodes(),
            edges: Vec::new(),
            source: LoadSource::Builtin,
        }
    }

    /// Writes the working graph to both stores, keeping any feature snapshot.
    pub fn save_local_graph(&mut self, nodes: &[GraphNode], edges: &[GraphEdge]) -> Result<(), PersistenceError> {
        let mut data = GraphData::new(LOCAL_GRAPH_NAME, Some(""), nodes, edges);
        data.features = Some(self.load_feature_snapshot().unwrap_or_default());
        let document = serde_json::to_string(&data)?;
        let nodes_json = serde_json::to_string(nodes)?;

        self.local.set(GRAPH_KEY, &document)?;
        self.session.set(GRAPH_SESSION_KEY, &document)?;
        self.local.set(NODES_KEY, &nodes_json)?;
        self.session.set(NODES_SESSION_KEY, &nodes_json)?;
        debug!(nodes = nodes.len(), edges = edges.len(), "saved local graph");
        Ok(())
    }

    pub fn save_normal_mode_backup(
        &mut self,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> Result<(), PersistenceError> {
        let data = GraphData::new(
            BACKUP_GRAPH_NAME,
            Some("Temporary backup of normal mode state"),
            nodes,
            edges,
        );
        self.session
            .set(NORMAL_BACKUP_KEY, &serde_json::to_string(&data)?)?;
        info!(nodes = nodes.len(), "saved normal mode backup");
        Ok(())
    }

    pub fn restore_normal_mode_backup(&self) -> Result<Option<(Vec<GraphNode>, Vec<GraphEdge>)>, PersistenceError> {
        let Some(json) = self.session.get(NORMAL_BACKUP_KEY)? else {
            return Ok(None);
        };
        Ok(Some(parse_document(&json)?.into_parts()))
    }

    /// Stores the feature snapshot inside the full documents of both stores.
    /// A store without one gets a features-only document, which loading
    /// does not treat as a saved graph.
    pub fn save_feature_snapshot(
        &mut self,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> Result<(), PersistenceError> {
        let snapshot = FeatureSnapshot {
            nodes: nodes.to_vec(),
            pins: pin_records(nodes),
            connections: edges.to_vec(),
        };
        embed_features(self.local.as_mut(), GRAPH_KEY, &snapshot)?;
        embed_features(self.session.as_mut(), GRAPH_SESSION_KEY, &snapshot)?;
        debug!(nodes = nodes.len(), "saved feature snapshot");
        Ok(())
    }

    pub fn load_feature_snapshot(&self) -> Option<FeatureSnapshot> {
        let tiers = [
            (self.session.as_ref(), GRAPH_SESSION_KEY),
            (self.local.as_ref(), GRAPH_KEY),
        ];
        for (store, key) in tiers {
            match store.get(key) {
                Ok(Some(json)) => match parse_document(&json) {
                    Ok(data) => {
                        if let Some(features) = data.features {
                            return Some(features);
                        }
                    }
                    Err(err) => warn!(key, "unreadable graph document: {err}"),
                },
                Ok(None) => {}
                Err(err) => warn!(key, "failed to read feature snapshot: {err}"),
            }
        }
        None
    }

    /// Forgets everything this crate has written to either store.
    pub fn reset(&mut self) -> Result<(), PersistenceError> {
        for key in OWNED_KEYS {
            self.local.remove(key)?;
            self.session.remove(key)?;
        }
        info!("cleared stored graph state");
        Ok(())
    }
}

fn load_tier(
    store: &dyn KeyValueStore,
    graph_key: &str,
    nodes_key: &str,
    source: LoadSource,
) -> Option<(Vec<GraphNode>, Vec<GraphEdge>)> {
    match store.get(graph_key) {
        Ok(Some(json)) => match parse_document(&json) {
            Ok(data) if data.is_features_only() => {
                debug!(%source, "graph document holds only a feature snapshot");
            }
            Ok(data) => return Some(data.into_parts()),
            Err(err) => {
                warn!(%source, "skipping unreadable graph document: {err}");
                return None;
            }
        },
        Ok(None) => {}
        Err(err) => {
            warn!(%source, "failed to read graph document: {err}");
            return None;
        }
    }

    match store.get(nodes_key) {
        Ok(Some(json)) => match serde_json::from_str::<Vec<GraphNode>>(&json) {
            Ok(nodes) => Some((nodes, Vec::new())),
            Err(err) => {
                warn!(%source, "skipping unreadable node list: {err}");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!(%source, "failed to read node list: {err}");
            None
        }
    }
}

fn embed_features(
    store: &mut dyn KeyValueStore,
    key: &str,
    snapshot: &FeatureSnapshot,
) -> Result<(), PersistenceError> {
    let data = match store.get(key)? {
        Some(json) => {
            let mut data = parse_document(&json)?;
            data.features = Some(snapshot.clone());
            data
        }
        None => GraphData::features_only(snapshot.clone()),
    };
    store.set(key, &serde_json::to_string(&data)?)?;
    Ok(())
}
