// src/utils/http.rs

//! HTTP client construction and identity rotation helpers.

use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};

use crate::error::Result;
use crate::models::CrawlerConfig;

/// Create an HTTP client, optionally routed through a proxy endpoint.
///
/// The client carries no default User-Agent; the fetcher attaches a fresh
/// identity to every request.
pub fn create_client(config: &CrawlerConfig, proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));

    if let Some(endpoint) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(endpoint)?);
    }

    Ok(builder.build()?)
}

/// Generate a throwaway identity token: a random-length random alphanumeric
/// string, used as the User-Agent to vary the request fingerprint.
pub fn random_identity() -> String {
    let mut rng = thread_rng();
    let len = rng.gen_range(1..=10);
    (&mut rng)
        .sample_iter(Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
