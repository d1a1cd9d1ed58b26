use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::geometry::Point;
use crate::model::{GraphEdge, GraphNode, PinRef, pin_reference};
use crate::persistence::{LoadSource, Persistence, builtin_nodes};
use crate::routing::Obstacle;

const EDGE_ID_PREFIX: &str = "conn_";

/// Which editing mode currently owns the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    #[default]
    Normal,
    FeatureFlag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityReport {
    pub total: usize,
    pub valid: usize,
    pub removed: usize,
}

/// The working diagram: nodes, connections and where they are persisted.
///
/// Every mutation except [`GraphState::clear`] is saved straight away.
/// In normal mode that rewrites the local graph; in feature-flag mode only
/// the feature snapshot is touched, so the user's circuit survives a visit
/// to the feature view.
pub struct GraphState {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    persistence: Persistence,
    mode: EditorMode,
    next_edge_id: u64,
}

impl GraphState {
    pub fn open(persistence: Persistence) -> Self {
        let mut state = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            persistence,
            mode: EditorMode::Normal,
            next_edge_id: 1,
        };
        state.reload();
        state
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|edge| edge.id.as_deref() == Some(id))
    }

    pub fn pin_position(&self, node_id: &str, pin_name: &str) -> Option<Point> {
        self.node(node_id)?.pin_position(pin_name)
    }

    pub fn pin_exists(&self, node_id: &str, pin_name: &str) -> bool {
        self.node(node_id)
            .is_some_and(|node| node.pin(pin_name).is_some())
    }

    /// Every placed node as a routing obstacle, endpoints included.
    pub fn obstacles(&self) -> Vec<Obstacle> {
        self.nodes.iter().map(GraphNode::obstacle).collect()
    }

    /// Reloads by priority: session, local, default file, built-in.
    pub fn reload(&mut self) -> LoadSource {
        let loaded = self.persistence.load_with_priority();
        self.nodes = loaded.nodes;
        self.edges = Vec::new();
        self.set_edges(loaded.edges);
        loaded.source
    }

    /// Swaps in a whole diagram, as when importing a file.
    pub fn replace_graph(&mut self, nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) {
        self.nodes = nodes;
        self.edges = Vec::new();
        self.set_edges(edges);
        info!(nodes = self.nodes.len(), edges = self.edges.len(), "replaced graph");
        self.autosave();
    }

    // ── Nodes ───────────────────────────────────────────────────────

    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
        self.autosave();
    }

    pub fn update_node_positions(&mut self, updates: &HashMap<String, Point>) {
        for node in &mut self.nodes {
            if let Some(position) = updates.get(&node.id) {
                node.x = position.x;
                node.y = position.y;
            }
        }
        self.autosave();
    }

    /// Replaces a node wholesale, pins included. Returns false for unknown ids.
    pub fn update_node(&mut self, node_id: &str, updated: GraphNode) -> bool {
        let Some(slot) = self.nodes.iter_mut().find(|node| node.id == node_id) else {
            warn!(node_id, "node not found");
            return false;
        };
        *slot = updated;
        debug!(node_id, "updated node");
        self.autosave();
        true
    }

    /// Deletes nodes and every connection attached to them.
    pub fn delete_nodes(&mut self, ids: &[&str]) {
        self.nodes.retain(|node| !ids.contains(&node.id.as_str()));
        let before = self.edges.len();
        self.edges
            .retain(|edge| !ids.iter().any(|id| edge.touches_node(id)));
        let removed = before - self.edges.len();
        if removed > 0 {
            info!(removed, "removed connections of deleted nodes");
        }
        self.autosave();
    }

    pub fn remove_pins(&mut self, node_id: &str, pin_names: &[&str]) {
        let Some(node) = self.nodes.iter_mut().find(|node| node.id == node_id) else {
            return;
        };
        let Some(pins) = node.pins.as_mut() else {
            return;
        };
        pins.retain(|pin| !pin_names.contains(&pin.name.as_str()));
        for name in pin_names {
            self.drop_connections_for_pin(node_id, name);
        }
        self.autosave();
    }

    /// Empties the canvas without saving.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        debug!("cleared canvas");
    }

    // ── Edges ───────────────────────────────────────────────────────

    /// Adds an edge and returns the id it was stored under.
    ///
    /// A missing id, or one already taken, is replaced with a fresh one.
    pub fn add_edge(&mut self, mut edge: GraphEdge) -> String {
        let id = match edge.id.take() {
            Some(id) if self.edge(&id).is_none() => id,
            _ => self.fresh_edge_id(),
        };
        edge.id = Some(id.clone());
        self.edges.push(edge);
        self.autosave();
        id
    }

    /// Replaces the edge stored under `edge_id`. Returns the id it ends up
    /// with, or `None` when no such edge exists.
    pub fn update_edge(&mut self, edge_id: &str, mut updated: GraphEdge) -> Option<String> {
        let index = self
            .edges
            .iter()
            .position(|edge| edge.id.as_deref() == Some(edge_id))?;
        let collides = |id: &str, edges: &[GraphEdge]| {
            edges
                .iter()
                .enumerate()
                .any(|(i, edge)| i != index && edge.id.as_deref() == Some(id))
        };
        let id = match updated.id.take() {
            Some(id) if !collides(&id, &self.edges) => id,
            Some(taken) => {
                debug!(edge_id, taken = %taken, "edge id already in use, assigning a new one");
                self.fresh_edge_id()
            }
            None => self.fresh_edge_id(),
        };
        updated.id = Some(id.clone());
        self.edges[index] = updated;
        self.autosave();
        Some(id)
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| edge.id.as_deref() != Some(edge_id));
        let removed = self.edges.len() != before;
        if removed {
            self.autosave();
        }
        removed
    }

    /// Replaces every edge, re-issuing ids where they are missing or repeated.
    pub fn set_edges(&mut self, edges: Vec<GraphEdge>) {
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(edges.len());
        let mut needs_id = Vec::new();
        for edge in edges {
            let unique = edge
                .id
                .as_deref()
                .is_some_and(|id| seen.insert(id.to_string()));
            if !unique {
                needs_id.push(accepted.len());
            }
            accepted.push(edge);
        }
        self.edges = accepted;
        self.sync_edge_counter();
        for index in needs_id {
            let id = self.fresh_edge_id();
            self.edges[index].id = Some(id);
        }
    }

    /// [`GraphState::set_edges`] followed by an auto-save.
    pub fn replace_edges(&mut self, edges: Vec<GraphEdge>) {
        self.set_edges(edges);
        self.autosave();
    }

    pub fn remove_connections_for_pin(&mut self, node_id: &str, pin_name: &str) -> usize {
        let removed = self.drop_connections_for_pin(node_id, pin_name);
        if removed > 0 {
            self.autosave();
        }
        removed
    }

    /// Drops connections whose endpoints no longer resolve to a pin.
    pub fn cleanup_orphaned_connections(&mut self) -> usize {
        self.validate_connection_integrity().removed
    }

    pub fn validate_connection_integrity(&mut self) -> IntegrityReport {
        let total = self.edges.len();
        let valid: Vec<GraphEdge> = self
            .edges
            .iter()
            .filter(|edge| self.connection_valid(edge))
            .cloned()
            .collect();
        let report = IntegrityReport {
            total,
            valid: valid.len(),
            removed: total - valid.len(),
        };
        if report.removed > 0 {
            self.edges = valid;
            info!(
                removed = report.removed,
                total, "removed orphaned connections"
            );
            self.autosave();
        }
        report
    }

    fn connection_valid(&self, edge: &GraphEdge) -> bool {
        let endpoint_ok = |pin: PinRef<'_>| {
            pin.pin_name
                .is_some_and(|name| self.pin_exists(pin.node_id, name))
        };
        endpoint_ok(edge.from_ref()) && endpoint_ok(edge.to_ref())
    }

    fn drop_connections_for_pin(&mut self, node_id: &str, pin_name: &str) -> usize {
        let reference = pin_reference(node_id, pin_name);
        let before = self.edges.len();
        self.edges
            .retain(|edge| edge.from != reference && edge.to != reference);
        let removed = before - self.edges.len();
        if removed > 0 {
            info!(removed, pin = %reference, "removed connections for pin");
        }
        removed
    }

    fn fresh_edge_id(&mut self) -> String {
        while let Some(next) = self.next_edge_id.checked_add(1) {
            let id = format!("{EDGE_ID_PREFIX}{}", self.next_edge_id);
            self.next_edge_id = next;
            if self.edge(&id).is_none() {
                return id;
            }
        }
        // Counter exhausted: take the lowest free number instead.
        let mut n: u64 = 1;
        loop {
            let id = format!("{EDGE_ID_PREFIX}{n}");
            if self.edge(&id).is_none() {
                return id;
            }
            n += 1;
        }
    }

    fn sync_edge_counter(&mut self) {
        let highest = self
            .edges
            .iter()
            .filter_map(|edge| edge.id.as_deref()?.strip_prefix(EDGE_ID_PREFIX)?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.next_edge_id = self.next_edge_id.max(highest.saturating_add(1));
    }

    // ── Modes and persistence ───────────────────────────────────────

    /// Hands the canvas to another editing mode, keeping the outgoing
    /// mode's graph so it can be restored on the way back.
    pub fn switch_mode(&mut self, target: EditorMode) {
        if target == self.mode {
            return;
        }
        match target {
            EditorMode::FeatureFlag => {
                self.save_normal_mode_state();
                self.clear();
                self.mode = EditorMode::FeatureFlag;
                if !self.restore_feature_mode_state() {
                    debug!("no feature snapshot, starting with an empty canvas");
                }
            }
            EditorMode::Normal => {
                self.save_feature_mode_state();
                self.mode = EditorMode::Normal;
                if !self.restore_normal_mode_state() {
                    let source = self.reload();
                    info!(%source, "no normal mode backup, reloaded graph");
                }
            }
        }
        info!(mode = ?self.mode, "switched editor mode");
    }

    pub fn save_normal_mode_state(&mut self) {
        if let Err(err) = self
            .persistence
            .save_normal_mode_backup(&self.nodes, &self.edges)
        {
            warn!("failed to save normal mode backup: {err}");
        }
    }

    /// Returns false when there is no usable backup.
    pub fn restore_normal_mode_state(&mut self) -> bool {
        match self.persistence.restore_normal_mode_backup() {
            Ok(Some((nodes, edges))) => {
                self.nodes = nodes;
                self.edges = Vec::new();
                self.set_edges(edges);
                info!(nodes = self.nodes.len(), "restored normal mode state");
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("failed to restore normal mode state: {err}");
                false
            }
        }
    }

    pub fn save_feature_mode_state(&mut self) {
        if let Err(err) = self
            .persistence
            .save_feature_snapshot(&self.nodes, &self.edges)
        {
            warn!("failed to save feature mode state: {err}");
        }
    }

    /// Returns false when no feature snapshot with nodes exists.
    pub fn restore_feature_mode_state(&mut self) -> bool {
        match self.persistence.load_feature_snapshot() {
            Some(snapshot) if !snapshot.nodes.is_empty() => {
                self.nodes = snapshot.nodes;
                self.edges = Vec::new();
                self.set_edges(snapshot.connections);
                info!(nodes = self.nodes.len(), "restored feature mode state");
                true
            }
            _ => false,
        }
    }

    /// Wipes stored state and starts over from the built-in diagram.
    pub fn reset_to_defaults(&mut self) {
        if let Err(err) = self.persistence.reset() {
            warn!("failed to clear stored graph state: {err}");
        }
        self.mode = EditorMode::Normal;
        self.nodes = builtin_nodes();
        self.edges.clear();
        info!("reset to built-in diagram");
    }

    fn autosave(&mut self) {
        let result = match self.mode {
            EditorMode::Normal => self.persistence.save_local_graph(&self.nodes, &self.edges),
            EditorMode::FeatureFlag => self
                .persistence
                .save_feature_snapshot(&self.nodes, &self.edges),
        };
        if let Err(err) = result {
            warn!("auto-save failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::model::Pin;
    use crate::persistence::{GRAPH_KEY, GRAPH_SESSION_KEY, NORMAL_BACKUP_KEY, parse_document};

    fn state() -> GraphState {
        GraphState::open(Persistence::in_memory())
    }

    fn user_node(id: &str) -> GraphNode {
        GraphNode::new(id, "resistor", Rect::new(200.0, 300.0, 60.0, 20.0), id)
            .with_pins(vec![Pin::new("A", 0.0, 10.0), Pin::new("B", 60.0, 10.0)])
    }

    fn edge_ids(state: &GraphState) -> Vec<String> {
        state.edges().iter().filter_map(|e| e.id.clone()).collect()
    }

    fn assert_unique_ids(state: &GraphState) {
        let ids = edge_ids(state);
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), state.edges().len());
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn opens_with_builtin_diagram() {
        let state = state();
        assert_eq!(state.nodes().len(), 5);
        assert_eq!(state.pin_position("power", "+9V"), Some(Point::new(180.0, 170.0)));
        assert!(state.pin_exists("amp1", "VCC"));
        assert!(!state.pin_exists("amp1", "NOPE"));
        assert_eq!(state.pin_position("ghost", "A"), None);
    }

    #[test]
    fn duplicate_edge_id_is_replaced() {
        let mut state = state();
        state.add_edge(GraphEdge::new("power.+9V", "reg.IN").with_id("conn_1"));
        let id = state.add_edge(GraphEdge::new("power.+9V", "mic1.OUT").with_id("conn_1"));
        assert_ne!(id, "conn_1");
        assert_eq!(state.edges().len(), 2);
        assert_unique_ids(&state);
    }

    #[test]
    fn missing_edge_ids_are_generated() {
        let mut state = state();
        for i in 0..3 {
            state.add_edge(GraphEdge::new(format!("nodeA.pin{i}"), format!("nodeB.pin{i}")));
        }
        assert_eq!(state.edges().len(), 3);
        assert_unique_ids(&state);
    }

    #[test]
    fn update_to_taken_id_gets_fresh_id() {
        let mut state = state();
        state.add_edge(GraphEdge::new("n1.p1", "n2.p2").with_id("e1"));
        state.add_edge(GraphEdge::new("n3.p3", "n4.p4").with_id("e2"));
        let id = state
            .update_edge("e1", GraphEdge::new("n1.p1", "n2.p2").with_id("e2"))
            .unwrap();
        assert_ne!(id, "e1");
        assert_ne!(id, "e2");
        assert_unique_ids(&state);
        assert!(state.update_edge("missing", GraphEdge::new("a", "b")).is_none());
    }

    #[test]
    fn update_keeping_own_id_is_allowed() {
        let mut state = state();
        state.add_edge(GraphEdge::new("n1.p1", "n2.p2").with_id("e1"));
        let mut edge = GraphEdge::new("n1.p1", "n2.p2").with_id("e1");
        edge.label = Some("bus".to_string());
        assert_eq!(state.update_edge("e1", edge).as_deref(), Some("e1"));
        assert_eq!(state.edge("e1").and_then(|e| e.label.as_deref()), Some("bus"));
    }

    #[test]
    fn mutations_autosave_to_both_stores() {
        let mut state = state();
        state.add_node(user_node("test-node"));
        for (store, key) in [
            (state.persistence().local(), GRAPH_KEY),
            (state.persistence().session(), GRAPH_SESSION_KEY),
        ] {
            let doc = parse_document(&store.get(key).unwrap().unwrap()).unwrap();
            assert!(doc.nodes.iter().any(|n| n.id == "test-node"));
        }

        let mut moves = HashMap::new();
        moves.insert("test-node".to_string(), Point::new(400.0, 500.0));
        state.update_node_positions(&moves);
        let doc = parse_document(&state.persistence().local().get(GRAPH_KEY).unwrap().unwrap()).unwrap();
        let moved = doc.nodes.iter().find(|n| n.id == "test-node").unwrap();
        assert_eq!((moved.x, moved.y), (400.0, 500.0));

        state.delete_nodes(&["test-node"]);
        let doc = parse_document(&state.persistence().local().get(GRAPH_KEY).unwrap().unwrap()).unwrap();
        assert!(doc.nodes.iter().all(|n| n.id != "test-node"));
    }

    #[test]
    fn deleting_node_removes_its_connections() {
        let mut state = state();
        state.add_edge(GraphEdge::new("power.+9V", "reg.IN"));
        state.add_edge(GraphEdge::new("mic1.OUT", "r1.A"));
        state.delete_nodes(&["reg"]);
        assert_eq!(state.edges().len(), 1);
        assert_eq!(state.edges()[0].from, "mic1.OUT");
    }

    #[test]
    fn removing_pin_removes_its_connections() {
        let mut state = state();
        state.add_edge(GraphEdge::new("r1.A", "mic1.OUT"));
        state.add_edge(GraphEdge::new("r1.B", "amp1.-IN"));
        state.remove_pins("r1", &["A"]);
        assert!(!state.pin_exists("r1", "A"));
        assert_eq!(state.edges().len(), 1);
        assert_eq!(state.edges()[0].from, "r1.B");
    }

    #[test]
    fn integrity_check_drops_orphans() {
        let mut state = state();
        state.add_edge(GraphEdge::new("power.+9V", "reg.IN"));
        state.add_edge(GraphEdge::new("power.+9V", "ghost.IN"));
        state.add_edge(GraphEdge::new("power", "reg.IN"));
        let report = state.validate_connection_integrity();
        assert_eq!(
            report,
            IntegrityReport {
                total: 3,
                valid: 1,
                removed: 2
            }
        );
        assert_eq!(state.cleanup_orphaned_connections(), 0);
    }

    #[test]
    fn update_unknown_node_is_a_no_op() {
        let mut state = state();
        assert!(!state.update_node("ghost", user_node("ghost")));
        assert_eq!(state.nodes().len(), 5);
    }

    #[test]
    fn normal_mode_backup_survives_feature_mode() {
        let mut state = state();
        state.add_node(user_node("user-change"));
        state.switch_mode(EditorMode::FeatureFlag);
        assert!(state.nodes().is_empty());
        assert!(state.persistence().session().get(NORMAL_BACKUP_KEY).unwrap().is_some());

        state.add_node(user_node("feature-node"));
        state.switch_mode(EditorMode::Normal);
        assert!(state.node("user-change").is_some());
        assert!(state.node("feature-node").is_none());
    }

    #[test]
    fn feature_mode_edits_do_not_touch_local_graph() {
        let mut state = state();
        state.add_node(user_node("user-node"));
        state.switch_mode(EditorMode::FeatureFlag);
        state.add_node(user_node("feature-a"));

        let doc = parse_document(&state.persistence().local().get(GRAPH_KEY).unwrap().unwrap()).unwrap();
        assert!(doc.nodes.iter().any(|n| n.id == "user-node"));
        assert!(doc.nodes.iter().all(|n| n.id != "feature-a"));
        let features = doc.features.unwrap();
        assert_eq!(features.nodes[0].id, "feature-a");

        state.switch_mode(EditorMode::Normal);
        state.switch_mode(EditorMode::FeatureFlag);
        assert!(state.node("feature-a").is_some());
    }

    #[test]
    fn feature_edits_on_a_fresh_store_survive_mode_switches() {
        let mut state = state();
        state.switch_mode(EditorMode::FeatureFlag);
        state.add_node(user_node("feature-a"));
        state.switch_mode(EditorMode::Normal);
        assert_eq!(state.nodes().len(), 5);
        assert!(state.node("feature-a").is_none());

        state.switch_mode(EditorMode::FeatureFlag);
        assert_eq!(state.nodes().len(), 1);
        assert!(state.node("feature-a").is_some());
        assert_eq!(state.reload(), LoadSource::Builtin);
    }

    #[test]
    fn restore_without_backup_reports_false() {
        let mut state = state();
        assert!(!state.restore_normal_mode_state());
        assert_eq!(state.nodes().len(), 5);
    }

    #[test]
    fn loaded_edges_get_unique_ids() {
        let mut persistence = Persistence::in_memory();
        persistence
            .save_local_graph(
                &[],
                &[
                    GraphEdge::new("a.x", "b.y").with_id("conn_4"),
                    GraphEdge::new("a.x", "c.y").with_id("conn_4"),
                    GraphEdge::new("a.x", "d.y"),
                ],
            )
            .unwrap();
        let mut state = GraphState::open(persistence);
        assert_unique_ids(&state);
        let id = state.add_edge(GraphEdge::new("e.x", "f.y"));
        assert_eq!(id, "conn_7");
    }

    #[test]
    fn largest_numeric_edge_id_does_not_overflow() {
        let mut state = state();
        let top = format!("conn_{}", u64::MAX);
        state.replace_edges(vec![
            GraphEdge::new("power.+9V", "reg.IN").with_id(top.clone()),
            GraphEdge::new("power.GND", "reg.GND").with_id("conn_1"),
        ]);
        let id = state.add_edge(GraphEdge::new("reg.OUT", "amp1.VCC"));
        assert_eq!(id, "conn_2");
        assert!(state.edge(&top).is_some());
        state.add_edge(GraphEdge::new("mic1.OUT", "r1.A"));
        assert_eq!(state.edges().len(), 4);
        assert_unique_ids(&state);
    }

    #[test]
    fn reset_returns_to_normal_mode() {
        let mut state = state();
        state.switch_mode(EditorMode::FeatureFlag);
        state.reset_to_defaults();
        assert_eq!(state.mode(), EditorMode::Normal);
        state.add_node(user_node("after-reset"));
        let doc = parse_document(&state.persistence().local().get(GRAPH_KEY).unwrap().unwrap()).unwrap();
        assert!(doc.nodes.iter().any(|n| n.id == "after-reset"));
    }

    #[test]
    fn reset_restores_builtin_diagram() {
        let mut state = state();
        state.delete_nodes(&["power", "reg"]);
        state.reset_to_defaults();
        assert_eq!(state.nodes().len(), 5);
        assert!(state.persistence().local().get(GRAPH_KEY).unwrap().is_none());
        assert_eq!(state.reload(), LoadSource::Builtin);
    }
}
