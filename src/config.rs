use crate::routing::DEFAULT_MARGIN;
use crate::theme::Theme;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory the CLI keeps its local store in when none is configured.
pub const DEFAULT_STORE_DIR: &str = ".wirepath";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutingConfig {
    pub margin: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    /// Space kept around the diagram's bounding box.
    pub padding: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
            padding: 20.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub local_dir: PathBuf,
    pub default_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from(DEFAULT_STORE_DIR),
            default_file: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub routing: RoutingConfig,
    pub theme: Theme,
    pub render: RenderConfig,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            routing: RoutingConfig::default(),
            theme,
            render,
            storage: StorageConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f64>,
    background: Option<String>,
    node_fill: Option<String>,
    node_stroke: Option<String>,
    node_text: Option<String>,
    pin_fill: Option<String>,
    pin_stroke: Option<String>,
    pin_text: Option<String>,
    signal_color: Option<String>,
    power_color: Option<String>,
    data_color: Option<String>,
    control_color: Option<String>,
    custom_color: Option<String>,
    highlight_color: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    margin: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    width: Option<f32>,
    height: Option<f32>,
    background: Option<String>,
    padding: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StorageConfigFile {
    local_dir: Option<PathBuf>,
    default_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    routing: Option<RoutingConfigFile>,
    render: Option<RenderConfigFile>,
    storage: Option<StorageConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = json5::from_str(&contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match Theme::named(theme_name) {
            Some(theme) => {
                config.theme = theme;
                config.render.background = config.theme.background.clone();
            }
            None => tracing::warn!(theme = theme_name, "unknown theme, keeping default"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        apply_theme_variables(&mut config.theme, vars);
    }

    if let Some(routing) = parsed.routing {
        if let Some(v) = routing.margin {
            config.routing.margin = v.max(0.0);
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.width {
            config.render.width = v;
        }
        if let Some(v) = render.height {
            config.render.height = v;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
        if let Some(v) = render.padding {
            config.render.padding = v;
        }
    }

    if let Some(storage) = parsed.storage {
        if let Some(v) = storage.local_dir {
            config.storage.local_dir = v;
        }
        if storage.default_file.is_some() {
            config.storage.default_file = storage.default_file;
        }
    }

    Ok(config)
}

fn apply_theme_variables(theme: &mut Theme, vars: ThemeVariables) {
    let overrides = [
        (vars.font_family, &mut theme.font_family),
        (vars.background, &mut theme.background),
        (vars.node_fill, &mut theme.node_fill),
        (vars.node_stroke, &mut theme.node_stroke),
        (vars.node_text, &mut theme.node_text),
        (vars.pin_fill, &mut theme.pin_fill),
        (vars.pin_stroke, &mut theme.pin_stroke),
        (vars.pin_text, &mut theme.pin_text),
        (vars.signal_color, &mut theme.signal_color),
        (vars.power_color, &mut theme.power_color),
        (vars.data_color, &mut theme.data_color),
        (vars.control_color, &mut theme.control_color),
        (vars.custom_color, &mut theme.custom_color),
        (vars.highlight_color, &mut theme.highlight_color),
    ];
    for (value, slot) in overrides {
        if let Some(value) = value {
            *slot = value;
        }
    }
    if let Some(v) = vars.font_size {
        theme.font_size = v;
    }
}
