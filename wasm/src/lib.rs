use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wirepath::config::RenderConfig;
use wirepath::model::GraphData;
use wirepath::render::render_svg;
use wirepath::theme::Theme;
use wirepath::{DEFAULT_MARGIN, Obstacle, Point, RoutedPath, calculate_route as route};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteRequest {
    start: Point,
    end: Point,
    #[serde(default)]
    obstacles: Vec<Obstacle>,
    margin: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f64>,
    padding: Option<f64>,
}

fn route_request(request: RouteRequest) -> RoutedPath {
    route(
        request.start,
        request.end,
        &request.obstacles,
        request.margin.unwrap_or(DEFAULT_MARGIN),
    )
}

fn build_theme(options: &GraphRenderOptions) -> Theme {
    let mut theme = options
        .theme
        .as_deref()
        .and_then(Theme::named)
        .unwrap_or_else(Theme::modern);
    if let Some(font_family) = &options.font_family {
        theme.font_family = font_family.clone();
    }
    if let Some(font_size) = options.font_size {
        theme.font_size = font_size;
    }
    theme
}

/// Routes one connection. Takes and returns JSON:
/// `{start, end, obstacles?, margin?}` in, `{points, totalDistance}` out.
#[wasm_bindgen]
pub fn calculate_route(request_json: &str) -> Result<String, JsValue> {
    let request = serde_json::from_str::<RouteRequest>(request_json)
        .map_err(|error| JsValue::from_str(&error.to_string()))?;
    serde_json::to_string(&route_request(request)).map_err(|error| JsValue::from_str(&error.to_string()))
}

#[wasm_bindgen]
pub fn render_graph_svg(document_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<GraphRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        GraphRenderOptions::default()
    };
    let document = serde_json::from_str::<GraphData>(document_json)
        .map_err(|error| JsValue::from_str(&error.to_string()))?;

    let theme = build_theme(&options);
    let mut config = RenderConfig {
        background: theme.background.clone(),
        ..Default::default()
    };
    if let Some(padding) = options.padding {
        config.padding = padding;
    }
    let (nodes, edges) = document.into_parts();
    Ok(render_svg(&nodes, &edges, &theme, &config))
}
