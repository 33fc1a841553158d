//! `idcheck status`: query a running daemon.

use anyhow::{Context, Result};
use serde_json::Value;

/// Fetch the daemon's `GET /` info document.
fn fetch_info(url: &str) -> Result<Value> {
    let body = ureq::get(url)
        .call()
        .with_context(|| format!("failed to reach idcheckd at {url}"))?
        .body_mut()
        .read_to_string()
        .context("failed to read response body")?;

    serde_json::from_str(&body).context("daemon returned invalid JSON")
}

pub fn run(url: &str) -> Result<()> {
    let url = url.trim_end_matches('/');
    let info = fetch_info(url)?;

    println!("URL:     {url}");
    println!("Service: {}", info["message"].as_str().unwrap_or("unknown"));
    println!("Version: {}", info["version"].as_str().unwrap_or("unknown"));
    if let Some(endpoints) = info["endpoints"].as_object() {
        println!("Endpoints:");
        for (route, description) in endpoints {
            println!("  {route:<14} {}", description.as_str().unwrap_or_default());
        }
    }
    Ok(())
}
