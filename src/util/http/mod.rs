use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{Client, Method, Response};

use crate::logging::Logger;

/// A singleton instance of the reqwest client.
static CLIENT: OnceCell<Client> = OnceCell::new();

static LOGGER: Lazy<Logger> = Lazy::new(|| Logger::new("http"));

/// Returns the reqwest client singleton instance or creates one if it doesn't exist.
///
/// # Returns
///
/// * Result<&'static Client>: A reference to the reqwest client instance,
///   or an error if the client cannot be created.
fn get_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        // a provider installed earlier by someone else is fine too
        let _ = rustls::crypto::ring::default_provider().install_default();

        Client::builder()
            .gzip(true)
            // ===== TCP =====
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            // ===== connection pool =====
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow!("Failed to create reqwest client: {:?}", e))
    })
}

/// Performs an HTTP GET request and returns the whole response body as text.
///
/// A non-success status is logged but the body is still returned, callers
/// decide what the payload means. There is no request timeout, a slow
/// upstream holds the caller until it answers or the connection drops.
///
/// # Errors
///
/// Fails when the request can't be built or sent, or when the body can't be read.
pub async fn get(url: &str) -> Result<String> {
    let response = send(Method::GET, url).await?;
    let status = response.status();
    if !status.is_success() {
        LOGGER.warn(format!("GET:{} answered with status {}", url, status));
    }

    response
        .text()
        .await
        .map_err(|why| anyhow!("Error reading response body from {}: {:?}", url, why))
}

/// Sends a single request, there is no retry on failure.
async fn send(method: Method, url: &str) -> Result<Response> {
    let visit_log = format!("{method}:{url}");
    let client = get_client()?;
    let request = client
        .request(method, url)
        .build()
        .map_err(|why| anyhow!("Failed to build request {} because {:?}", visit_log, why))?;
    let start = Instant::now();
    let res = client.execute(request).await;
    let elapsed = start.elapsed().as_millis();

    match res {
        Ok(response) => {
            LOGGER.info(format!("{} {} {} ms", visit_log, response.status(), elapsed));
            Ok(response)
        }
        Err(why) => {
            LOGGER.error(format!("{} failed because {:?}. {} ms", visit_log, why, elapsed));
            Err(anyhow!("Failed to send request {} because {:?}", visit_log, why))
        }
    }
}
