use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::form::FormBridge;
use crate::store::StoreSettings;

/// Environment variable that overrides the configured category.
pub const CATEGORY_ENV: &str = "TICKETBOOK_CATEGORY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketbookConfig {
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
    #[serde(default)]
    pub form: FormConfig,
}

impl Default for TicketbookConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            label: default_label(),
            namespace: default_namespace(),
            name_field: default_name_field(),
            form: FormConfig::default(),
        }
    }
}

impl TicketbookConfig {
    #[must_use]
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            category: self.category.clone(),
            label: self.label.clone(),
        }
    }

    #[must_use]
    pub fn form_bridge(&self) -> FormBridge {
        FormBridge::new(&self.form.date_field, &self.form.secondary_id_field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormConfig {
    #[serde(default = "default_date_field")]
    pub date_field: String,
    #[serde(default = "default_secondary_id_field")]
    pub secondary_id_field: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            date_field: default_date_field(),
            secondary_id_field: default_secondary_id_field(),
        }
    }
}

pub fn load_config(project_root: &Path) -> Result<TicketbookConfig> {
    let path = project_root.join(".ticketbook/config.toml");
    if !path.exists() {
        return Ok(TicketbookConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<TicketbookConfig>(&content).with_context(|| {
        let code = ErrorCode::ConfigParseError;
        format!("{code}: {} in {}", code.message(), path.display())
    })
}

/// Project config with the environment applied on top.
pub fn resolve_config(project_root: &Path) -> Result<TicketbookConfig> {
    let config = load_config(project_root)?;
    Ok(apply_category_override(config, env::var(CATEGORY_ENV).ok()))
}

fn apply_category_override(mut config: TicketbookConfig, category: Option<String>) -> TicketbookConfig {
    if let Some(category) = category.map(|c| c.trim().to_ascii_lowercase()).filter(|c| !c.is_empty()) {
        config.category = category;
    }
    config
}

/// Platform data directory for file-backed stores, e.g.
/// `~/.local/share/ticketbook` on Linux.
#[must_use]
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("ticketbook"))
}

fn default_category() -> String {
    "repair".to_string()
}

fn default_label() -> String {
    "Console".to_string()
}

fn default_namespace() -> String {
    "records".to_string()
}

fn default_name_field() -> String {
    "customer_name".to_string()
}

fn default_date_field() -> String {
    "ticketDate".to_string()
}

fn default_secondary_id_field() -> String {
    "ticketId".to_string()
}
