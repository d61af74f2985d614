//! Environment readiness check.

use crate::browser::chromium::find_chromium;
use crate::config::{PortalConfig, DESKTOP_USER_AGENT};
use anyhow::Result;
use std::time::Duration;

/// Check Chromium availability, portal reachability, and credentials.
pub async fn run() -> Result<()> {
    println!("Portico Doctor");
    println!("==============");
    println!();

    // OS and architecture
    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    let config = PortalConfig::from_env();
    println!("Portal: {}", config.base_url);
    println!();

    // Check Chromium
    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install google-chrome or chromium, or set PORTICO_CHROMIUM_PATH."
        ),
    }

    // Check portal reachability. Any HTTP answer counts; the login page
    // itself may well be a 30x or behind a redirect chain.
    let reachable = match probe_portal(&config.base_url).await {
        Ok(status) => {
            println!("[OK] Portal reachable (HTTP {status})");
            true
        }
        Err(e) => {
            println!("[!!] Portal unreachable: {e:#}");
            false
        }
    };

    // Check credentials env
    match std::env::var("PORTICO_SECRET") {
        Ok(v) if !v.is_empty() => println!("[OK] PORTICO_SECRET is set"),
        _ => println!("[!!] PORTICO_SECRET not set. Export it before running fetch commands."),
    }

    println!();
    if chromium_path.is_some() && reachable {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}

/// Issue a plain GET against the portal origin with the same user agent
/// the automated session presents. Returns the HTTP status code.
pub(crate) async fn probe_portal(base_url: &str) -> Result<u16> {
    let client = reqwest::Client::builder()
        .user_agent(DESKTOP_USER_AGENT)
        .timeout(Duration::from_secs(10))
        .build()?;
    let resp = client.get(base_url).send().await?;
    Ok(resp.status().as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_probe_reports_status_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let status = probe_portal(&server.uri()).await.unwrap();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn test_probe_passes_error_pages_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        // A 503 still proves the host answered.
        let status = probe_portal(&server.uri()).await.unwrap();
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn test_probe_fails_on_refused_connection() {
        let err = probe_portal("http://127.0.0.1:1").await;
        assert!(err.is_err());
    }
}
