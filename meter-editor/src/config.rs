use std::{fs, time::Duration};

use anyhow::{bail, Context};
use feature_client::{ArcGisFeatureStore, FieldMap};
use serde::Deserialize;

use crate::classify::Palette;

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureServiceConfig {
    pub layer_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_where_clause")]
    pub where_clause: String,
    #[serde(default = "default_out_sr")]
    pub out_sr: Option<u32>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub fields: FieldMap,
}

fn default_page_size() -> usize {
    1000
}

fn default_where_clause() -> String {
    "1=1".to_string()
}

fn default_out_sr() -> Option<u32> {
    Some(4326)
}

impl FeatureServiceConfig {
    pub fn connect(&self) -> feature_client::Result<ArcGisFeatureStore> {
        let mut store = ArcGisFeatureStore::new(&self.layer_url, self.fields.clone())?;
        if let Some(wkid) = self.out_sr {
            store = store.with_out_sr(wkid);
        }
        if let Some(token) = &self.api_token {
            store = store.with_token(token.clone());
        }
        Ok(store)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub min_chars: usize,
    pub max_results: usize,
    pub debounce_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_chars: 2,
            max_results: 10,
            debounce_ms: 300,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Re-read the record from the feature service instead of trusting the loaded copy.
    pub refetch_on_select: bool,
    /// Map-click search radius, in the units of the layer's spatial reference.
    pub hit_tolerance: f64,
    pub zoom_scale: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            refetch_on_select: false,
            hit_tolerance: 0.0005,
            zoom_scale: 2000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub keep_panel_open_after_save: bool,
    /// Send an empty account update as null rather than "".
    pub normalize_empty_to_null: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            keep_panel_open_after_save: false,
            normalize_empty_to_null: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub feature_service: FeatureServiceConfig,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("METER_EDITOR_CONFIG")
            .unwrap_or_else(|_| "meter-editor.toml".to_string());
        let contents = fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// A configuration pointing at `layer_url` with every other value defaulted.
    pub fn for_layer(layer_url: impl Into<String>) -> Self {
        Self {
            feature_service: FeatureServiceConfig {
                layer_url: layer_url.into(),
                page_size: default_page_size(),
                where_clause: default_where_clause(),
                out_sr: default_out_sr(),
                api_token: None,
                fields: FieldMap::default(),
            },
            palette: Palette::default(),
            search: SearchConfig::default(),
            selection: SelectionConfig::default(),
            editor: EditorConfig::default(),
            server: ServerConfig::default(),
            metrics: None,
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.feature_service.page_size == 0 {
            bail!("feature_service.page_size must be greater than zero");
        }
        if self.search.max_results == 0 {
            bail!("search.max_results must be greater than zero");
        }
        if !(self.selection.hit_tolerance.is_finite() && self.selection.hit_tolerance >= 0.0) {
            bail!("selection.hit_tolerance must be a non-negative number");
        }
        Ok(())
    }
}
