use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_token_path() -> String {
    "token.json".to_string()
}

fn default_out_dir() -> String {
    "reports".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_impressions() -> u64 {
    500
}

fn default_max_ctr() -> f64 {
    0.01
}

fn default_window() -> usize {
    7
}

fn default_z_threshold() -> f64 {
    2.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub auth: AuthConfig,
    pub dates: DatesConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    pub branded: BrandedConfig,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_token_path")]
    pub token_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_path: default_token_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatesConfig {
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FiltersConfig {
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrandedConfig {
    pub pattern: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default)]
    pub opportunity: OpportunityThresholds,
    #[serde(default)]
    pub anomaly: AnomalyThresholds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpportunityThresholds {
    #[serde(default = "default_min_impressions")]
    pub min_impressions: u64,
    #[serde(default = "default_max_ctr")]
    pub max_ctr: f64,
}

impl Default for OpportunityThresholds {
    fn default() -> Self {
        Self {
            min_impressions: default_min_impressions(),
            max_ctr: default_max_ctr(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnomalyThresholds {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            window: default_window(),
            z_threshold: default_z_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_out_dir")]
    pub dir: String,
    #[serde(default = "default_true")]
    pub markdown: bool,
    #[serde(default = "default_true")]
    pub html: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
            markdown: default_true(),
            html: default_true(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<AuditConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: AuditConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    Ok(config)
}
