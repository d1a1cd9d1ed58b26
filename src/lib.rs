#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod connect;
pub mod geometry;
pub mod graph;
#[cfg(feature = "cli")]
pub mod logging;
pub mod model;
pub mod persistence;
pub mod render;
pub mod routing;
pub mod storage;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use connect::{ConnectError, ConnectOptions, connect, reroute_all};
pub use geometry::{Point, Rect, path_distance};
pub use graph::{EditorMode, GraphState, IntegrityReport};
pub use model::{GraphData, GraphEdge, GraphNode, Pin};
pub use persistence::{LoadSource, Persistence, PersistenceError};
pub use routing::{DEFAULT_MARGIN, Obstacle, RoutedPath, calculate_route, calculate_route_default};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
