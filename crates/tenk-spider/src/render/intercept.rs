use crate::http::*;
use base64::prelude::{Engine, BASE64_STANDARD};
use chromiumoxide::cdp::browser_protocol::fetch::HeaderEntry;
use std::time::Duration;
use tracing::warn;

/// Bound on one intercepted resource re-fetch; past it the request falls
/// back to the browser's own network stack.
const REFETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Routing verdict for one intercepted browser request.
#[derive(Debug)]
pub enum FetchDecision {
    /// Answer the browser with this server-side response.
    Fulfill {
        status: i64,
        headers: Vec<HeaderEntry>,
        /// Base64, as the CDP fulfill call expects.
        body: String,
    },
    /// Let the browser's own network stack attempt the fetch.
    PassThrough,
}

/// A response captured through the authenticated client.
#[derive(Debug)]
pub(super) struct FetchedResource {
    pub(super) status: i64,
    pub(super) headers: Vec<HeaderEntry>,
    pub(super) body: Vec<u8>,
}

/// Map a re-fetch outcome onto a routing decision. A failed re-fetch never
/// aborts the render; one missing image is not worth the document.
pub(super) fn decide(url: &str, fetched: anyhow::Result<FetchedResource>) -> FetchDecision {
    match fetched {
        Ok(resource) => FetchDecision::Fulfill {
            status: resource.status,
            headers: resource.headers,
            body: BASE64_STANDARD.encode(&resource.body),
        },
        Err(err) => {
            warn!("failed to fetch resource {url}, error({err}); passing request through");
            FetchDecision::PassThrough
        }
    }
}

/// Re-issue a browser request through the authenticated client, which
/// carries the SEC identity headers the browser cannot send itself.
pub(super) async fn refetch(client: &HttpClient, url: &str) -> anyhow::Result<FetchedResource> {
    let response = client.get(url).timeout(REFETCH_TIMEOUT).send().await?;
    let status = response.status().as_u16() as i64;

    // the body is handed over decoded, so transfer-framing headers from the
    // origin no longer describe it
    let headers = response
        .headers()
        .iter()
        .filter(|(name, _)| {
            !matches!(
                name.as_str(),
                "content-encoding" | "content-length" | "transfer-encoding"
            )
        })
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|value| HeaderEntry {
                name: name.to_string(),
                value: value.to_string(),
            })
        })
        .collect();

    let body = response.bytes().await?.to_vec();

    Ok(FetchedResource {
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_refetch_fulfills_with_base64_body() {
        let fetched = FetchedResource {
            status: 200,
            headers: vec![HeaderEntry {
                name: "content-type".to_string(),
                value: "image/gif".to_string(),
            }],
            body: b"GIF89a".to_vec(),
        };

        match decide("https://www.sec.gov/logo.gif", Ok(fetched)) {
            FetchDecision::Fulfill {
                status,
                headers,
                body,
            } => {
                assert_eq!(status, 200);
                assert_eq!(headers.len(), 1);
                assert_eq!(body, BASE64_STANDARD.encode(b"GIF89a"));
            }
            FetchDecision::PassThrough => panic!("expected a fulfilled request"),
        }
    }

    #[test]
    fn failed_refetch_passes_through() {
        let decision = decide(
            "https://www.sec.gov/logo.gif",
            Err(anyhow::anyhow!("connection reset")),
        );
        assert!(matches!(decision, FetchDecision::PassThrough));
    }
}
