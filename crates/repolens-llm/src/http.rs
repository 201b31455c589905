//! Shared HTTP client for the remote backends.

use std::time::Duration;

/// Build the HTTP client every remote provider starts from.
///
/// 15s connect timeout, 120s request timeout (rerank and embed batches can
/// be slow), `repolens/{version}` user-agent.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(120))
        .user_agent(concat!("repolens/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("default HTTP client construction must not fail")
}

pub(crate) fn trim_base_url(mut base_url: String) -> String {
    while base_url.ends_with('/') {
        base_url.pop();
    }
    base_url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_removed() {
        assert_eq!(
            trim_base_url("https://api.cohere.com//".into()),
            "https://api.cohere.com"
        );
        assert_eq!(trim_base_url("http://x".into()), "http://x");
    }
}
