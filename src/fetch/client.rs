use std::net::IpAddr;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{redirect, Client, Url};

use crate::config::FetcherConfig;
use crate::error::ExtractError;

/// HTTP client for caller-supplied recipe URLs.
///
/// The target host is resolved before any connection is made; if any
/// resolved address is loopback, private, link-local, unique-local, or
/// unspecified the fetch is refused, so a "recipe URL" cannot be aimed
/// at internal infrastructure. Redirects are capped and response bodies
/// are read under a byte budget.
pub struct SafeFetcher {
    client: Client,
    max_body_bytes: usize,
    guard_enabled: bool,
}

impl SafeFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::limited(config.max_redirects))
            .user_agent("Mozilla/5.0 (compatible; RecipeExtractBot/1.0)")
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
            guard_enabled: true,
        })
    }

    /// Test-only constructor that skips the address guard so fixtures can
    /// run against a local mock server.
    #[cfg(test)]
    pub(crate) fn unguarded(config: &FetcherConfig) -> Result<Self, ExtractError> {
        let mut fetcher = Self::new(config)?;
        fetcher.guard_enabled = false;
        Ok(fetcher)
    }

    /// Fetch a page and return its HTML body.
    ///
    /// Fails if the URL is not http(s), if the host resolves to a
    /// non-public address, if the response does not declare an HTML
    /// content type, or if the body exceeds the size cap.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ExtractError> {
        let parsed = Url::parse(url)
            .map_err(|e| ExtractError::InvalidRequest(format!("invalid URL '{url}': {e}")))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ExtractError::InvalidRequest(format!(
                "unsupported URL scheme '{}'",
                parsed.scheme()
            )));
        }

        if self.guard_enabled {
            self.guard_target(&parsed).await?;
        }

        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::ApiStatus {
                status: status.as_u16(),
                message: format!("fetching {url}"),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(ExtractError::NotHtml(content_type));
        }

        // Stream the body under the cap rather than buffering blindly
        let mut body: Vec<u8> = Vec::new();
        let mut response = response;
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(ExtractError::BodyTooLarge(self.max_body_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        debug!("Fetched {} bytes from {url}", body.len());
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Resolve the target host and refuse non-public addresses before a
    /// single packet is sent to it.
    async fn guard_target(&self, url: &Url) -> Result<(), ExtractError> {
        let host = url
            .host_str()
            .ok_or_else(|| ExtractError::InvalidRequest("URL has no host".to_string()))?;
        let port = url.port_or_known_default().unwrap_or(443);

        // Literal IPs skip DNS entirely
        if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
            if is_disallowed(ip) {
                warn!("Blocked fetch of literal address {ip}");
                return Err(ExtractError::UnsafeUrl(host.to_string()));
            }
            return Ok(());
        }

        let addrs: Vec<_> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| {
                ExtractError::InvalidRequest(format!("could not resolve '{host}': {e}"))
            })?
            .collect();

        if addrs.is_empty() {
            return Err(ExtractError::InvalidRequest(format!(
                "'{host}' resolved to no addresses"
            )));
        }
        // One bad address poisons the whole set: a DNS-rebinding name can
        // mix public and internal records.
        for addr in &addrs {
            if is_disallowed(addr.ip()) {
                warn!("Blocked fetch of {host}: resolves to {}", addr.ip());
                return Err(ExtractError::UnsafeUrl(host.to_string()));
            }
        }
        Ok(())
    }
}

/// Whether an address must never be fetched on behalf of a caller.
fn is_disallowed(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                // 100.64.0.0/10 carrier-grade NAT
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xc0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_disallowed(IpAddr::V4(mapped));
            }
            let segments = v6.segments();
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique-local
                || (segments[0] & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}
