use crate::config::RenderConfig;
use crate::geometry::{Point, Rect};
use crate::model::{
    ConnectionDirection, ConnectionType, FontWeight, GraphEdge, GraphNode, PinRef, StrokeStyle,
};
use crate::theme::Theme;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

const NODE_CORNER_RADIUS: f64 = 4.0;
const PIN_RADIUS: f64 = 3.0;
const DEFAULT_STROKE_WIDTH: f64 = 1.5;

const CONNECTION_KINDS: [ConnectionType; 5] = [
    ConnectionType::Signal,
    ConnectionType::Power,
    ConnectionType::Data,
    ConnectionType::Control,
    ConnectionType::Custom,
];

pub fn render_svg(nodes: &[GraphNode], edges: &[GraphEdge], theme: &Theme, config: &RenderConfig) -> String {
    let by_id: HashMap<&str, &GraphNode> = nodes.iter().map(|node| (node.id.as_str(), node)).collect();
    let paths: Vec<(&GraphEdge, Vec<Point>)> = edges
        .iter()
        .filter_map(|edge| edge_points(edge, &by_id).map(|points| (edge, points)))
        .collect();

    let bounds = diagram_bounds(nodes, &paths, config.padding);
    let width = bounds.width.max(200.0);
    let height = bounds.height.max(200.0);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"{:.2} {:.2} {width:.2} {height:.2}\">",
        bounds.x, bounds.y
    ));
    svg.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        bounds.x, bounds.y, config.background
    ));

    svg.push_str("<defs>");
    for kind in CONNECTION_KINDS {
        svg.push_str(&format!(
            "<marker id=\"arrow-{}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
            kind_name(kind),
            theme.connection_color(kind)
        ));
    }
    svg.push_str("</defs>");

    for (edge, points) in &paths {
        svg.push_str(&edge_svg(edge, points, theme));
    }

    for node in nodes {
        svg.push_str(&node_svg(node, theme));
    }

    svg.push_str("</svg>");
    svg
}

fn edge_points(edge: &GraphEdge, nodes: &HashMap<&str, &GraphNode>) -> Option<Vec<Point>> {
    if let Some(points) = edge.routed_path.as_ref().filter(|points| points.len() >= 2) {
        return Some(points.clone());
    }
    let resolve = |reference: PinRef<'_>| {
        nodes
            .get(reference.node_id)?
            .pin_position(reference.pin_name?)
    };
    Some(vec![resolve(edge.from_ref())?, resolve(edge.to_ref())?])
}

fn diagram_bounds(nodes: &[GraphNode], paths: &[(&GraphEdge, Vec<Point>)], padding: f64) -> Rect {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut include = |p: Point| {
        min = Point::new(min.x.min(p.x), min.y.min(p.y));
        max = Point::new(max.x.max(p.x), max.y.max(p.y));
    };
    for node in nodes {
        let [top_left, _, bottom_right, _] = node.rect().corners();
        include(top_left);
        include(bottom_right);
    }
    for (_, points) in paths {
        points.iter().copied().for_each(&mut include);
    }
    if !min.x.is_finite() {
        return Rect::new(0.0, 0.0, 0.0, 0.0);
    }
    Rect::new(min.x, min.y, max.x - min.x, max.y - min.y).inflate(padding)
}

fn edge_svg(edge: &GraphEdge, points: &[Point], theme: &Theme) -> String {
    let kind = edge.kind.unwrap_or_default();
    let color = escape_xml(match &edge.color {
        Some(color) => color.as_str(),
        None if edge.is_selected == Some(true) || edge.is_highlighted == Some(true) => {
            theme.highlight_color.as_str()
        }
        None => theme.connection_color(kind),
    });
    let marker_id = kind_name(kind);
    let markers = match edge.direction.unwrap_or_default() {
        ConnectionDirection::Forward => format!(" marker-end=\"url(#arrow-{marker_id})\""),
        ConnectionDirection::Backward => format!(" marker-start=\"url(#arrow-{marker_id})\""),
        ConnectionDirection::Bidirectional => format!(
            " marker-start=\"url(#arrow-{marker_id})\" marker-end=\"url(#arrow-{marker_id})\""
        ),
        ConnectionDirection::None => String::new(),
    };
    let dash = match edge.stroke_style.unwrap_or_default() {
        StrokeStyle::Solid => "",
        StrokeStyle::Dashed => " stroke-dasharray=\"8 4\"",
        StrokeStyle::Dotted => " stroke-dasharray=\"2 3\"",
    };
    let stroke_width = edge.stroke_width.unwrap_or(DEFAULT_STROKE_WIDTH);

    let mut svg = format!(
        "<polyline points=\"{}\" fill=\"none\" stroke=\"{color}\" stroke-width=\"{stroke_width}\"{dash}{markers}/>",
        points_attr(points)
    );
    if let Some(label) = edge.label.as_deref().filter(|label| !label.is_empty()) {
        let mid = path_midpoint(points);
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{color}\">{}</text>",
            mid.x,
            mid.y - 4.0,
            theme.font_family,
            theme.font_size * 0.9,
            escape_xml(label)
        ));
    }
    svg
}

fn node_svg(node: &GraphNode, theme: &Theme) -> String {
    let mut svg = format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{NODE_CORNER_RADIUS}\" ry=\"{NODE_CORNER_RADIUS}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"/>",
        node.x, node.y, node.width, node.height, theme.node_fill, theme.node_stroke
    );

    let center = node.rect().center();
    let offset = node.label_position.unwrap_or_default();
    let style = node.label_style.as_ref();
    let font_size = style.map_or(theme.font_size, |s| s.font_size);
    let font_family = escape_xml(style.map_or(theme.font_family.as_str(), |s| s.font_family.as_str()));
    let fill = escape_xml(style.map_or(theme.node_text.as_str(), |s| s.color.as_str()));
    let weight = match style.map(|s| s.font_weight).unwrap_or_default() {
        FontWeight::Normal => "normal",
        FontWeight::Bold => "bold",
        FontWeight::Lighter => "lighter",
        FontWeight::Bolder => "bolder",
    };
    svg.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" dominant-baseline=\"central\" font-family=\"{font_family}\" font-size=\"{font_size}\" font-weight=\"{weight}\" fill=\"{fill}\">{}</text>",
        center.x + offset.offset_x,
        center.y + offset.offset_y,
        escape_xml(&node.label)
    ));

    for pin in node.pins() {
        let x = node.x + pin.x;
        let y = node.y + pin.y;
        svg.push_str(&format!(
            "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{PIN_RADIUS}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"/>",
            theme.pin_fill, theme.pin_stroke
        ));
        // Names sit outside the node, on the side the pin is closest to.
        let (dx, anchor) = if pin.x >= node.width / 2.0 {
            (PIN_RADIUS + 2.0, "start")
        } else {
            (-(PIN_RADIUS + 2.0), "end")
        };
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"{anchor}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            x + dx,
            y - PIN_RADIUS,
            theme.font_family,
            theme.font_size * 0.75,
            theme.pin_text,
            escape_xml(&pin.name)
        ));
    }
    svg
}

fn kind_name(kind: ConnectionType) -> &'static str {
    match kind {
        ConnectionType::Signal => "signal",
        ConnectionType::Power => "power",
        ConnectionType::Data => "data",
        ConnectionType::Control => "control",
        ConnectionType::Custom => "custom",
    }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.2},{:.2}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn path_midpoint(points: &[Point]) -> Point {
    match points {
        [] => Point::new(0.0, 0.0),
        [only] => *only,
        _ => {
            let i = (points.len() - 1) / 2;
            let (a, b) = (points[i], points[i + 1]);
            Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
        }
    }
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Arial".to_string();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .ok_or_else(|| anyhow::anyhow!("invalid render size"))?;
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
