use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::editor::DraftDefaults;
use crate::error::ConfigError;
use crate::export::FilenameStyle;
use crate::model::{Party, DEFAULT_CURRENCY, DEFAULT_LOCALE};
use crate::render::DEFAULT_TEMPLATE;

pub const SETTINGS_FILE: &str = "settings.toml";

/// Seller details prefilled on every new draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SellerConfig {
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub data_root: String,
    pub currency: String,
    pub locale: String,
    pub template_id: String,
    pub tax_rate: f64,
    pub filename_style: FilenameStyle,
    pub seller: SellerConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_root: "~/Documents/Invoices".to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            template_id: DEFAULT_TEMPLATE.to_string(),
            tax_rate: 0.0,
            filename_style: FilenameStyle::default(),
            seller: SellerConfig::default(),
        }
    }
}

impl AppSettings {
    pub fn data_root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    /// Draft, history and last-number slots.
    pub fn store_dir(&self) -> PathBuf {
        self.data_root().join("store")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_root().join("output")
    }

    /// Optional `<id>.<preview|typ>.tera` overrides.
    pub fn templates_dir(&self) -> PathBuf {
        self.data_root().join("templates")
    }

    pub fn draft_defaults(&self) -> DraftDefaults {
        let template_id = self.template_id.trim();
        DraftDefaults {
            currency: self.currency.trim().to_string(),
            locale: self.locale.trim().to_string(),
            template_id: (!template_id.is_empty()).then(|| template_id.to_string()),
            tax_rate: self.tax_rate,
            seller: Party {
                name: self.seller.name.clone(),
                address: self.seller.address.clone(),
                email: self.seller.email.clone(),
                phone: self.seller.phone.clone(),
                bank: None,
            },
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-drafter", "app") {
        return proj_dirs.config_dir().join(SETTINGS_FILE);
    }
    PathBuf::from(SETTINGS_FILE)
}

/// Settings at `path`, or `None` when the file does not exist yet.
pub fn load_settings_from(path: &Path) -> Result<Option<AppSettings>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(toml::from_str(&content)?))
}

pub fn load_settings() -> Result<Option<AppSettings>, ConfigError> {
    load_settings_from(&config_path())
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io { path: path.display().to_string(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    fs::write(path, toml_str).map_err(io_err)
}

pub fn save_settings(settings: &AppSettings) -> Result<(), ConfigError> {
    save_settings_to(&config_path(), settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
