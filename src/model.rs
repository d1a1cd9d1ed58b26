use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::routing::Obstacle;

/// Version written into every saved document.
pub const DOCUMENT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub x: f64,
    pub y: f64,
    pub name: String,
}

impl Pin {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
    Lighter,
    Bolder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    Start,
    #[default]
    Middle,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    Top,
    #[default]
    Middle,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLabelStyle {
    pub font_size: f64,
    pub font_family: String,
    pub font_weight: FontWeight,
    pub color: String,
    pub alignment: TextAnchor,
    pub vertical_alignment: VerticalAlign,
    pub wrap: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
}

impl Default for NodeLabelStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            font_family: "Arial, sans-serif".to_string(),
            font_weight: FontWeight::Normal,
            color: "#000000".to_string(),
            alignment: TextAnchor::Middle,
            vertical_alignment: VerticalAlign::Middle,
            wrap: false,
            max_width: None,
        }
    }
}

/// Offset of a node label from the node centre.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLabelPosition {
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins: Option<Vec<Pin>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_position: Option<NodeLabelPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_style: Option<NodeLabelStyle>,
}

impl GraphNode {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        rect: Rect,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            label: label.into(),
            value: None,
            unit: None,
            pins: None,
            label_position: None,
            label_style: None,
        }
    }

    pub fn with_pins(mut self, pins: Vec<Pin>) -> Self {
        self.pins = Some(pins);
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn pins(&self) -> &[Pin] {
        self.pins.as_deref().unwrap_or(&[])
    }

    pub fn pin(&self, name: &str) -> Option<&Pin> {
        self.pins().iter().find(|pin| pin.name == name)
    }

    /// Absolute canvas position of a pin.
    pub fn pin_position(&self, name: &str) -> Option<Point> {
        self.pin(name)
            .map(|pin| Point::new(self.x + pin.x, self.y + pin.y))
    }

    pub fn obstacle(&self) -> Obstacle {
        Obstacle {
            id: self.id.clone(),
            rect: self.rect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ConnectionDirection {
    Forward,
    Backward,
    Bidirectional,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Signal,
    Power,
    Data,
    Control,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<ConnectionDirection>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConnectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_style: Option<StrokeStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routed_path: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_routed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_selected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_highlighted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl GraphEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn from_ref(&self) -> PinRef<'_> {
        PinRef::parse(&self.from)
    }

    pub fn to_ref(&self) -> PinRef<'_> {
        PinRef::parse(&self.to)
    }

    pub fn touches_node(&self, node_id: &str) -> bool {
        self.from_ref().node_id == node_id || self.to_ref().node_id == node_id
    }
}

/// Connection endpoint written as `nodeId.pinName`, or a bare `nodeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinRef<'a> {
    pub node_id: &'a str,
    pub pin_name: Option<&'a str>,
}

impl<'a> PinRef<'a> {
    pub fn parse(reference: &'a str) -> Self {
        match reference.split_once('.') {
            Some((node_id, pin_name)) => Self {
                node_id,
                pin_name: Some(pin_name),
            },
            None => Self {
                node_id: reference,
                pin_name: None,
            },
        }
    }
}

pub fn pin_reference(node_id: &str, pin_name: &str) -> String {
    format!("{node_id}.{pin_name}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub created: String,
    pub modified: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Flattened pin entry written alongside the nodes for readers that index pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRecord {
    pub id: String,
    pub node_id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    #[serde(rename = "feature-nodes", default)]
    pub nodes: Vec<GraphNode>,
    #[serde(rename = "featurePins", default)]
    pub pins: Vec<PinRecord>,
    #[serde(rename = "feature-connections", default)]
    pub connections: Vec<GraphEdge>,
}

/// On-disk and in-storage diagram document.
///
/// Every field is optional on read so older documents, which only carried
/// `nodes` and `edges`, still load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins: Option<Vec<PinRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<GraphEdge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<GraphEdge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureSnapshot>,
}

impl GraphData {
    pub fn new(
        name: &str,
        description: Option<&str>,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: Some(DOCUMENT_VERSION.to_string()),
            metadata: Some(DocumentMetadata {
                created: now.clone(),
                modified: now,
                name: name.to_string(),
                description: description.map(str::to_string),
            }),
            nodes: nodes.to_vec(),
            pins: Some(pin_records(nodes)),
            connections: Some(edges.to_vec()),
            edges: None,
            features: None,
        }
    }

    /// A document holding only a feature snapshot. Written when feature-mode
    /// edits arrive before any graph has been saved.
    pub fn features_only(snapshot: FeatureSnapshot) -> Self {
        Self {
            version: Some(DOCUMENT_VERSION.to_string()),
            metadata: None,
            nodes: Vec::new(),
            pins: None,
            connections: None,
            edges: None,
            features: Some(snapshot),
        }
    }

    pub fn is_features_only(&self) -> bool {
        self.features.is_some()
            && self.nodes.is_empty()
            && self.pins.is_none()
            && self.connections.is_none()
            && self.edges.is_none()
    }

    /// Nodes and edges, preferring `connections` over the legacy `edges` key.
    pub fn into_parts(self) -> (Vec<GraphNode>, Vec<GraphEdge>) {
        let edges = self.connections.or(self.edges).unwrap_or_default();
        (self.nodes, edges)
    }
}

pub fn pin_records(nodes: &[GraphNode]) -> Vec<PinRecord> {
    nodes
        .iter()
        .flat_map(|node| {
            node.pins().iter().map(move |pin| PinRecord {
                id: pin_reference(&node.id, &pin.name),
                node_id: node.id.clone(),
                label: pin.name.clone(),
                x: pin.x,
                y: pin.y,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_ref_splits_at_first_dot() {
        let r = PinRef::parse("amp1.+IN");
        assert_eq!(r.node_id, "amp1");
        assert_eq!(r.pin_name, Some("+IN"));

        let r = PinRef::parse("reg.v.out");
        assert_eq!(r.node_id, "reg");
        assert_eq!(r.pin_name, Some("v.out"));

        let r = PinRef::parse("power");
        assert_eq!(r.node_id, "power");
        assert_eq!(r.pin_name, None);
    }

    #[test]
    fn pin_position_is_relative_to_node() {
        let node = GraphNode::new("r1", "resistor", Rect::new(180.0, 270.0, 60.0, 20.0), "10k")
            .with_pins(vec![Pin::new("A", 0.0, 10.0), Pin::new("B", 60.0, 10.0)]);
        assert_eq!(node.pin_position("B"), Some(Point::new(240.0, 280.0)));
        assert_eq!(node.pin_position("C"), None);
    }

    #[test]
    fn node_json_uses_type_key() {
        let json = r#"{"id":"mic1","type":"component","x":100,"y":250,"width":40,"height":40,"label":"MIC1","pins":[{"x":40,"y":20,"name":"OUT"}]}"#;
        let node: GraphNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.kind, "component");
        assert_eq!(node.pins().len(), 1);
        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], "component");
        assert!(back.get("labelStyle").is_none());
    }

    #[test]
    fn edge_json_is_camel_case() {
        let mut edge = GraphEdge::new("power.+9V", "reg.IN").with_id("conn_1");
        edge.direction = Some(ConnectionDirection::None);
        edge.kind = Some(ConnectionType::Signal);
        edge.is_routed = Some(true);
        edge.routed_path = Some(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)]);
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json["direction"], "none");
        assert_eq!(json["type"], "signal");
        assert_eq!(json["isRouted"], true);
        assert_eq!(json["routedPath"].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn legacy_document_uses_edges_key() {
        let json = r#"{"nodes":[],"edges":[{"from":"a.x","to":"b.y"}]}"#;
        let data: GraphData = serde_json::from_str(json).unwrap();
        let (nodes, edges) = data.into_parts();
        assert!(nodes.is_empty());
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn connections_win_over_legacy_edges() {
        let json = r#"{"version":"1.0","nodes":[],"connections":[{"from":"a.x","to":"b.y"}],"edges":[]}"#;
        let data: GraphData = serde_json::from_str(json).unwrap();
        let (_, edges) = data.into_parts();
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn feature_snapshot_keys() {
        let snapshot = FeatureSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("feature-nodes").is_some());
        assert!(json.get("featurePins").is_some());
        assert!(json.get("feature-connections").is_some());
    }
}
