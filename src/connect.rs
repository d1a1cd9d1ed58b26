use thiserror::Error;
use tracing::{debug, info};

use crate::geometry::Point;
use crate::graph::GraphState;
use crate::model::{ConnectionDirection, ConnectionType, GraphEdge, PinRef};
use crate::routing::{DEFAULT_MARGIN, calculate_route};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("cannot connect pin `{0}` to itself")]
    SamePin(String),
    #[error("unknown node `{0}`")]
    UnknownNode(String),
}

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub direction: ConnectionDirection,
    pub kind: ConnectionType,
    pub label: Option<String>,
    pub margin: f64,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            direction: ConnectionDirection::None,
            kind: ConnectionType::Signal,
            label: None,
            margin: DEFAULT_MARGIN,
        }
    }
}

/// Creates a connection between two pin references and returns its id.
///
/// The route is computed with every node on the canvas as an obstacle. When
/// either pin has no position the edge is stored as a plain straight
/// connection.
pub fn connect(
    state: &mut GraphState,
    from: &str,
    to: &str,
    options: ConnectOptions,
) -> Result<String, ConnectError> {
    if from == to {
        return Err(ConnectError::SamePin(from.to_string()));
    }
    for reference in [from, to] {
        let node_id = PinRef::parse(reference).node_id;
        if state.node(node_id).is_none() {
            return Err(ConnectError::UnknownNode(node_id.to_string()));
        }
    }

    let mut edge = GraphEdge::new(from, to);
    edge.direction = Some(options.direction);
    edge.kind = Some(options.kind);
    edge.label = options.label;
    apply_route(state, &mut edge, options.margin);

    let id = state.add_edge(edge);
    info!(id = %id, from, to, "created connection");
    Ok(id)
}

/// Recomputes the route of every connection, typically after nodes moved.
/// Returns how many connections ended up with a bent path.
pub fn reroute_all(state: &mut GraphState, margin: f64) -> usize {
    let mut edges = state.edges().to_vec();
    for edge in &mut edges {
        apply_route(state, edge, margin);
    }
    let routed = edges
        .iter()
        .filter(|edge| edge.is_routed == Some(true))
        .count();
    state.replace_edges(edges);
    debug!(routed, "rerouted connections");
    routed
}

fn endpoint(state: &GraphState, reference: &str) -> Option<Point> {
    let pin = PinRef::parse(reference);
    state.pin_position(pin.node_id, pin.pin_name?)
}

fn apply_route(state: &GraphState, edge: &mut GraphEdge, margin: f64) {
    let (Some(start), Some(end)) = (endpoint(state, &edge.from), endpoint(state, &edge.to)) else {
        debug!(from = %edge.from, to = %edge.to, "pin position unknown, skipping router");
        edge.routed_path = None;
        edge.is_routed = Some(false);
        return;
    };
    let route = calculate_route(start, end, &state.obstacles(), margin);
    let routed = route.is_routed();
    edge.is_routed = Some(routed);
    edge.routed_path = routed.then_some(route.points);
}
