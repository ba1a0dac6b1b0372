//! Subscription download. Providers report quota through the
//! `subscription-userinfo` response header alongside the body.

use anyhow::{Context, Result};
use std::time::Duration;

use sbm_config::UsageCounters;

pub struct Fetched {
    pub body: String,
    /// Counters plus optional expiry timestamp, when the header was sent.
    pub usage: Option<(UsageCounters, Option<u64>)>,
}

pub fn fetch_subscription(url: &str) -> Result<Fetched> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("sbm/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;
    let resp = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .with_context(|| format!("fetching {url}"))?;
    let usage = resp
        .headers()
        .get("subscription-userinfo")
        .and_then(|v| v.to_str().ok())
        .map(UsageCounters::parse_header);
    let body = resp.text().context("reading subscription body")?;
    Ok(Fetched { body, usage })
}
