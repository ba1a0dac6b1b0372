//! Logging setup: level from `SBM_LOG`, format from `SBM_LOG_FORMAT`
//! (`compact` default, `json` for machine consumers).

use tracing_subscriber::{fmt, EnvFilter};

pub fn init() {
    let filter = EnvFilter::try_from_env("SBM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("SBM_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(false).compact().init();
    }
}
