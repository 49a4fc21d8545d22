use crate::http::*;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::fetch;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

mod intercept;
pub use intercept::FetchDecision;

/// One render job: a self-contained HTML document, the URL it was downloaded
/// from (relative references resolve against it; it is never fetched), and
/// the PDF destination.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub html: String,
    pub source_url: String,
    pub output_path: PathBuf,
}

/// Pagination seam; the pipeline only needs a yes/no outcome, and tests can
/// stand in a stub instead of a browser.
#[allow(async_fn_in_trait)]
pub trait Render {
    async fn render(&self, request: RenderRequest) -> bool;
}

// Chromium prints in inches.
const LETTER_WIDTH_IN: f64 = 8.5;
const LETTER_HEIGHT_IN: f64 = 11.0;
const MARGIN_1CM_IN: f64 = 0.394;

/// Renders HTML to PDF through a per-call headless Chromium instance.
///
/// The SEC allow-lists client identity headers that Chromium's own network
/// stack cannot be made to send per-request, so every resource request the
/// page issues (images, stylesheets) is intercepted and re-fetched through
/// an authenticated [`reqwest`] client instead.
pub struct PdfRenderer {
    client: HttpClient,
}

impl PdfRenderer {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    async fn try_render(&self, request: &RenderRequest) -> anyhow::Result<()> {
        let html = inject_base(&request.html, &base_href(&request.source_url));

        if let Some(dir) = request.output_path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }

        // one isolated browser per document; nothing is pooled across calls
        let (mut browser, mut handler) = Browser::launch(
            BrowserConfig::builder()
                .build()
                .map_err(|err| anyhow::anyhow!("failed to configure browser: {err}"))?,
        )
        .await?;
        let browser_loop = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self
            .render_page(&browser, &html, &request.output_path)
            .await;

        // tear the browser down whatever happened above
        if let Err(err) = browser.close().await {
            warn!("failed to close browser, error({err})");
        }
        let _ = browser.wait().await;
        browser_loop.abort();

        result
    }

    async fn render_page(
        &self,
        browser: &Browser,
        html: &str,
        output_path: &Path,
    ) -> anyhow::Result<()> {
        let page = browser.new_page("about:blank").await?;

        // pause every outbound request before Chromium's network stack sees it
        page.execute(fetch::EnableParams {
            patterns: Some(vec![fetch::RequestPattern {
                url_pattern: Some("*".to_string()),
                resource_type: None,
                request_stage: Some(fetch::RequestStage::Request),
            }]),
            handle_auth_requests: None,
        })
        .await?;

        let mut paused = page
            .event_listener::<fetch::EventRequestPaused>()
            .await?;

        let in_flight = Arc::new(AtomicUsize::new(0));
        let last_activity = Arc::new(Mutex::new(Instant::now()));

        let intercept_page = page.clone();
        let client = self.client.clone();
        let counter = in_flight.clone();
        let activity = last_activity.clone();
        let interceptor = tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let url = event.request.url.clone();
                trace!("intercepted resource request: {url}");

                let decision = intercept::decide(&url, intercept::refetch(&client, &url).await);
                let outcome = match decision {
                    FetchDecision::Fulfill {
                        status,
                        headers,
                        body,
                    } => {
                        intercept_page
                            .execute(fetch::FulfillRequestParams {
                                request_id: event.request_id.clone(),
                                response_code: status,
                                response_headers: Some(headers),
                                binary_response_headers: None,
                                body: Some(body.into()),
                                response_phrase: None,
                            })
                            .await
                            .map(|_| ())
                    }
                    FetchDecision::PassThrough => {
                        intercept_page
                            .execute(fetch::ContinueRequestParams::new(event.request_id.clone()))
                            .await
                            .map(|_| ())
                    }
                };
                if let Err(err) = outcome {
                    warn!("failed to answer intercepted request {url}, error({err})");
                }

                counter.fetch_sub(1, Ordering::SeqCst);
                *activity.lock().expect("activity clock") = Instant::now();
            }
        });

        page.set_content(html).await?;

        // pagination must not start until all intercepted resource fetches
        // have resolved
        wait_for_settle(&in_flight, &last_activity).await;

        page.save_pdf(
            PrintToPdfParams {
                print_background: Some(true),
                paper_width: Some(LETTER_WIDTH_IN),
                paper_height: Some(LETTER_HEIGHT_IN),
                margin_top: Some(MARGIN_1CM_IN),
                margin_bottom: Some(MARGIN_1CM_IN),
                margin_left: Some(MARGIN_1CM_IN),
                margin_right: Some(MARGIN_1CM_IN),
                ..Default::default()
            },
            output_path,
        )
        .await?;

        interceptor.abort();
        Ok(())
    }
}

impl Render for PdfRenderer {
    /// Any failure at any step logs and becomes `false`; rendering never
    /// takes the batch down.
    async fn render(&self, request: RenderRequest) -> bool {
        debug!(
            "rendering {} -> {}",
            request.source_url,
            request.output_path.display()
        );
        match self.try_render(&request).await {
            Ok(()) => true,
            Err(err) => {
                error!("failed to render {}, error({err})", request.source_url);
                false
            }
        }
    }
}

/// Network idle, Playwright-style: no re-fetch in flight and none started
/// for a quiescence window. Every re-fetch is individually bounded, so the
/// wait always terminates.
async fn wait_for_settle(in_flight: &AtomicUsize, last_activity: &Mutex<Instant>) {
    const QUIET: Duration = Duration::from_millis(500);

    loop {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let quiet_for = last_activity.lock().expect("activity clock").elapsed();
        if in_flight.load(Ordering::SeqCst) == 0 && quiet_for >= QUIET {
            return;
        }
    }
}

/// The document URL minus its final path segment, trailing slash kept;
/// relative resource references resolve against this.
fn base_href(source_url: &str) -> String {
    match source_url.rsplit_once('/') {
        Some((base, _)) => format!("{base}/"),
        None => source_url.to_string(),
    }
}

/// Point the in-memory document at its true origin, so the engine resolves
/// relative references remotely instead of against a blank page.
fn inject_base(html: &str, href: &str) -> String {
    let tag = format!("<base href=\"{href}\">");
    if html.contains("<head>") {
        html.replacen("<head>", &format!("<head>{tag}"), 1)
    } else {
        format!("{tag}{html}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_href_drops_the_last_path_segment() {
        assert_eq!(
            base_href("https://x.test/a/b/doc.htm"),
            "https://x.test/a/b/"
        );
        assert_eq!(
            base_href("https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/aapl-20240928.htm"),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000123/"
        );
    }

    #[test]
    fn base_injected_into_existing_head() {
        let html = "<html><head><title>t</title></head><body></body></html>";
        let out = inject_base(html, "https://x.test/a/b/");
        assert_eq!(
            out,
            "<html><head><base href=\"https://x.test/a/b/\"><title>t</title></head><body></body></html>"
        );
    }

    #[test]
    fn base_prepended_when_no_head() {
        let html = "<p><img src=\"logo.gif\"></p>";
        let out = inject_base(html, "https://x.test/a/b/");
        assert!(out.starts_with("<base href=\"https://x.test/a/b/\">"));
        assert!(out.ends_with(html));
    }

    #[test]
    fn relative_image_resolves_under_the_source_directory() {
        // a browser resolves `logo.gif` against the injected base; the htm
        // segment itself must not survive into the base
        let base = base_href("https://x.test/a/b/doc.htm");
        assert_eq!(format!("{base}logo.gif"), "https://x.test/a/b/logo.gif");
    }
}
