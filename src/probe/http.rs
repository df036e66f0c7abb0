//! HTTP probe implementation.

use std::time::Duration;
use super::ProbeError;

/// Build the client shared by all probes.
///
/// Certificates are not verified: a probe checks reachability, not trust.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ProbeError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(true)
        .user_agent(concat!("statusboard/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProbeError::Config(e.to_string()))
}

/// Run an HTTP GET against the given URL.
///
/// Any status code is a successful probe; only transport failures are
/// errors. Returns the status code after the full body has been received.
pub async fn run_http_probe(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<u16, ProbeError> {
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ProbeError::Timeout(timeout)
        } else if e.is_builder() {
            ProbeError::Config(e.to_string())
        } else {
            ProbeError::Network(e.to_string())
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;
    let status = response.status().as_u16();

    // Read the full body to measure complete transfer time
    let _body = response.bytes().await.map_err(map_err)?;

    Ok(status)
}
