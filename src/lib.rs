//! Syndicate POS core.
//!
//! Domain logic for the shop counter, independent of any UI shell: the
//! catalog snapshot and cart, order totals, the checkout orchestrator that
//! drives cash, UPI gateway and QR payments (with compensation of orphaned
//! orders), receipt rendering for screen and thermal printers, the order
//! history pager and the admin dashboard aggregations.
//!
//! A shell wires it together roughly like this:
//!
//! ```no_run
//! # async fn wire() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use syndicate_pos_lib::{api::ApiClient, settings::Settings};
//!
//! let settings = Settings::load(std::path::Path::new("settings.json"))?;
//! let _guard = syndicate_pos_lib::init_logging(
//!     &syndicate_pos_lib::diagnostics::get_log_dir(),
//!     settings.log_filter.as_deref(),
//! )?;
//! let api = Arc::new(ApiClient::new(
//!     &settings.api_base_url,
//!     std::time::Duration::from_secs(settings.request_timeout_secs),
//! )?);
//! # let _ = api;
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod dashboard;
pub mod diagnostics;
pub mod escpos;
pub mod history;
pub mod models;
pub mod receipt_renderer;
pub mod settings;
pub mod totals;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthError, AuthState, Permission, Role, StaffSession};
pub use cart::{Cart, CheckoutSession, SessionHandle};
pub use catalog::{CatalogBackend, CatalogStore};
pub use checkout::{
    Checkout, CheckoutConfig, CheckoutError, CheckoutEvent, CheckoutState, GatewayCallbacks,
    GatewayWidget, OrderBackend, PaymentBackend,
};
pub use dashboard::{DashboardReport, DatePreset, DateWindow};
pub use models::{PaymentMethod, SavedOrder};
pub use settings::{Settings, SettingsError};
pub use totals::{compute_totals, Totals};

const DEFAULT_LOG_FILTER: &str = "info,syndicate_pos_lib=debug";

/// Install the global tracing subscriber: console output plus a daily
/// rolling JSON file under `log_dir`.
///
/// Filter precedence: `RUST_LOG`, then `filter`, then the built-in default.
/// Old log files are pruned first. Keep the returned guard alive for the
/// lifetime of the process; dropping it flushes and stops the file writer.
pub fn init_logging(log_dir: &Path, filter: Option<&str>) -> anyhow::Result<WorkerGuard> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => {
            let directive = filter
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .unwrap_or(DEFAULT_LOG_FILTER);
            EnvFilter::try_new(directive)
                .with_context(|| format!("invalid log filter {directive:?}"))?
        }
    };

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
    let pruned = diagnostics::prune_old_logs(log_dir, diagnostics::MAX_LOG_FILES);

    let file_appender = tracing_appender::rolling::daily(log_dir, diagnostics::LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        log_dir = %log_dir.display(),
        pruned,
        "Starting Syndicate POS"
    );
    Ok(guard)
}
