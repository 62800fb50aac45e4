//! Counter settings.
//!
//! Read from a camelCase JSON file; a missing file yields defaults. A few
//! deployment values can be overridden from the environment:
//!
//! | Variable           | Field          |
//! |--------------------|----------------|
//! | `POS_API_BASE_URL` | `apiBaseUrl`   |
//! | `POS_GATEWAY_KEY`  | `payment.gatewayKey` |
//! | `POS_TAX_PERCENT`  | `taxPercent`   |

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::escpos::PaperWidth;
use crate::totals::{sanitize_tax_percent, DEFAULT_TAX_PERCENT};

pub const ENV_API_BASE_URL: &str = "POS_API_BASE_URL";
pub const ENV_GATEWAY_KEY: &str = "POS_GATEWAY_KEY";
pub const ENV_TAX_PERCENT: &str = "POS_TAX_PERCENT";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessInfo {
    pub shop_name: String,
    pub address: String,
    pub contact: String,
    pub gst_number: Option<String>,
}

impl Default for BusinessInfo {
    fn default() -> Self {
        Self {
            shop_name: "My Retail Shop".to_string(),
            address: String::new(),
            contact: String::new(),
            gst_number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentConfig {
    /// Public key handed to the gateway widget.
    pub gateway_key: String,
    pub currency: String,
    /// Shop QR code image (URL or data URI) shown for scan-to-pay.
    pub qr_code: Option<String>,
    pub upi_id: Option<String>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            gateway_key: String::new(),
            currency: "INR".to_string(),
            qr_code: None,
            upi_id: None,
        }
    }
}

impl PaymentConfig {
    pub fn qr_configured(&self) -> bool {
        self.qr_code
            .as_deref()
            .map(str::trim)
            .is_some_and(|qr| !qr.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptOptions {
    pub footer: String,
    /// Close the receipt on its own after this many seconds.
    pub auto_close_secs: Option<u64>,
    pub paper_width_mm: u32,
}

impl Default for ReceiptOptions {
    fn default() -> Self {
        Self {
            footer: "Thank You for Your Business!".to_string(),
            auto_close_secs: Some(13),
            paper_width_mm: 80,
        }
    }
}

impl ReceiptOptions {
    pub fn paper_width(&self) -> PaperWidth {
        PaperWidth::from_mm(self.paper_width_mm)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub business: BusinessInfo,
    pub payment: PaymentConfig,
    pub tax_percent: f64,
    pub receipt: ReceiptOptions,
    /// `EnvFilter` directive for logging.
    pub log_filter: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 30,
            business: BusinessInfo::default(),
            payment: PaymentConfig::default(),
            tax_percent: DEFAULT_TAX_PERCENT,
            receipt: ReceiptOptions::default(),
            log_filter: None,
        }
    }
}

impl Settings {
    /// Load settings from `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_json(&raw).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No settings file, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        settings.apply_env_overrides();
        settings.validate();
        Ok(settings)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    /// Write the settings back as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = env_value(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(key) = env_value(ENV_GATEWAY_KEY) {
            self.payment.gateway_key = key;
        }
        if let Some(raw) = env_value(ENV_TAX_PERCENT) {
            match raw.parse::<f64>() {
                Ok(tax) => self.tax_percent = tax,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {ENV_TAX_PERCENT}"),
            }
        }
    }

    fn validate(&mut self) {
        self.tax_percent = sanitize_tax_percent(self.tax_percent);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        if self.payment.currency.trim().is_empty() {
            self.payment.currency = PaymentConfig::default().currency;
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
