use serde::{Deserialize, Serialize};

use crate::model::ConnectionType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f64,
    pub background: String,
    pub node_fill: String,
    pub node_stroke: String,
    pub node_text: String,
    pub pin_fill: String,
    pub pin_stroke: String,
    pub pin_text: String,
    pub signal_color: String,
    pub power_color: String,
    pub data_color: String,
    pub control_color: String,
    pub custom_color: String,
    pub highlight_color: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "Arial, sans-serif".to_string(),
            font_size: 12.0,
            background: "#FFFFFF".to_string(),
            node_fill: "#F5F5F5".to_string(),
            node_stroke: "#333333".to_string(),
            node_text: "#000000".to_string(),
            pin_fill: "#FFFFFF".to_string(),
            pin_stroke: "#333333".to_string(),
            pin_text: "#555555".to_string(),
            signal_color: "#333333".to_string(),
            power_color: "#D32F2F".to_string(),
            data_color: "#1976D2".to_string(),
            control_color: "#388E3C".to_string(),
            custom_color: "#7B1FA2".to_string(),
            highlight_color: "#FF9800".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 11.0,
            background: "#FFFFFF".to_string(),
            node_fill: "#F8FAFF".to_string(),
            node_stroke: "#C7D2E5".to_string(),
            node_text: "#1C2430".to_string(),
            pin_fill: "#EEF2F8".to_string(),
            pin_stroke: "#7A8AA6".to_string(),
            pin_text: "#5B6B85".to_string(),
            signal_color: "#7A8AA6".to_string(),
            power_color: "#E5484D".to_string(),
            data_color: "#3E63DD".to_string(),
            control_color: "#30A46C".to_string(),
            custom_color: "#8E4EC6".to_string(),
            highlight_color: "#F76808".to_string(),
        }
    }

    /// Looks a theme up by the name used in config files.
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "modern" => Some(Self::modern()),
            "default" | "classic" => Some(Self::classic()),
            _ => None,
        }
    }

    pub fn connection_color(&self, kind: ConnectionType) -> &str {
        match kind {
            ConnectionType::Signal => &self.signal_color,
            ConnectionType::Power => &self.power_color,
            ConnectionType::Data => &self.data_color,
            ConnectionType::Control => &self.control_color,
            ConnectionType::Custom => &self.custom_color,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic()
    }
}
