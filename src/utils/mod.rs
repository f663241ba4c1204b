// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;

/// Join the configured base URL and an endpoint path without doubling
/// slashes. Absolute endpoints pass through untouched; category links on
/// the reference site are root-relative.
pub fn join_endpoint(base_url: &str, endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return endpoint.to_string();
    }

    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
