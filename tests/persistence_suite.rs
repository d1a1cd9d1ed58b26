use std::collections::HashMap;

use wirepath::persistence::{GRAPH_KEY, read_document, write_document};
use wirepath::{
    ConnectOptions, EditorMode, FileStore, GraphData, GraphEdge, GraphState, KeyValueStore, LoadSource,
    MemoryStore, Persistence, Point, connect,
};

fn file_backed(dir: &std::path::Path) -> Persistence {
    Persistence::new(Box::new(MemoryStore::new()), Box::new(FileStore::new(dir)))
}

#[test]
fn local_store_survives_a_new_session() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut state = GraphState::open(file_backed(dir.path()));
        connect(&mut state, "power.+9V", "reg.IN", ConnectOptions::default()).unwrap();
        let mut moves = HashMap::new();
        moves.insert("mic1".to_string(), Point::new(20.0, 400.0));
        state.update_node_positions(&moves);
    }

    let mut state = GraphState::open(file_backed(dir.path()));
    assert_eq!(state.reload(), LoadSource::Local);
    assert_eq!(state.edges().len(), 1);
    let mic = state.node("mic1").unwrap();
    assert_eq!((mic.x, mic.y), (20.0, 400.0));
}

#[test]
fn default_file_is_used_when_stores_are_empty() {
    let dir = tempfile::tempdir().unwrap();
    let doc_path = dir.path().join("default.graph.json");
    let state = GraphState::open(Persistence::in_memory());
    let mut nodes = state.nodes().to_vec();
    nodes.truncate(2);
    let data = GraphData::new("Default", None, &nodes, &[GraphEdge::new("power.+9V", "reg.IN")]);
    write_document(&doc_path, &data).unwrap();

    let mut state = GraphState::open(Persistence::in_memory().with_default_file(&doc_path));
    assert_eq!(state.nodes().len(), 2);
    assert_eq!(state.edges().len(), 1);
    assert!(state.edges()[0].id.is_some());
    assert_eq!(state.reload(), LoadSource::DefaultFile);
}

#[test]
fn export_then_import_into_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    let export_path = dir.path().join("export.json");

    let mut source = GraphState::open(Persistence::in_memory());
    connect(&mut source, "mic1.OUT", "r1.A", ConnectOptions::default()).unwrap();
    let data = GraphData::new("Exported Graph", None, source.nodes(), source.edges());
    write_document(&export_path, &data).unwrap();

    let (nodes, edges) = read_document(&export_path).unwrap().into_parts();
    let store_dir = dir.path().join("store");
    let mut target = GraphState::open(file_backed(&store_dir));
    target.replace_graph(nodes, edges);
    assert_eq!(target.edges().len(), 1);
    assert!(FileStore::new(&store_dir).get(GRAPH_KEY).unwrap().is_some());
}

#[test]
fn corrupt_local_file_falls_back_to_builtin() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(format!("{GRAPH_KEY}.json")), "{ nope").unwrap();
    let mut state = GraphState::open(file_backed(dir.path()));
    assert_eq!(state.reload(), LoadSource::Builtin);
    assert_eq!(state.nodes().len(), 5);
}

#[test]
fn mode_round_trip_keeps_user_circuit() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = GraphState::open(file_backed(dir.path()));
    connect(&mut state, "power.+9V", "reg.IN", ConnectOptions::default()).unwrap();

    state.switch_mode(EditorMode::FeatureFlag);
    assert_eq!(state.mode(), EditorMode::FeatureFlag);
    assert!(state.nodes().is_empty());

    state.switch_mode(EditorMode::Normal);
    assert_eq!(state.nodes().len(), 5);
    assert_eq!(state.edges().len(), 1);
}
