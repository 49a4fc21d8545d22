use crate::http::*;
use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, trace};

mod submissions;
mod tickers;

/// One selected annual-report filing.
#[derive(Clone, Debug)]
pub struct Filing {
    /// Zero-padded 10-digit CIK.
    pub cik: String,
    pub filing_date: NaiveDate,
    /// Absolute URL of the filing's primary document.
    pub url: String,
}

/// Client for the SEC EDGAR API.
///
/// Owns the one rate-limited, authenticated channel every EDGAR request goes
/// through, and the lazily-built ticker -> CIK directory.
pub struct SecClient {
    client: HttpClient,
    gate: RateGate,
    ticker_map: tickers::TickerDirectory,
}

impl SecClient {
    /// `user_agent` must carry a contact method; the SEC throttles or blocks
    /// anonymous clients.
    pub fn new(user_agent: &str, rate_limit: Duration) -> anyhow::Result<Self> {
        // the gzip/deflate features negotiate Accept-Encoding on every call
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            gate: RateGate::new(rate_limit),
            ticker_map: tickers::TickerDirectory::new(),
        })
    }

    /// GET `url` behind the shared rate gate, with a Host override matching
    /// the destination's expected virtual host.
    async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        self.gate.wait().await;

        let host = reqwest::Url::parse(url)?
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("no host in url: {url}"))?
            .to_string();

        trace!("GET {url}");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::HOST, host)
            .send()
            .await?
            .error_for_status()?;

        Ok(response)
    }
}

impl crate::pipeline::Registry for SecClient {
    /// Resolve a ticker (e.g. `AAPL`) to its CIK (e.g. `0000320193`).
    ///
    /// The company directory is fetched once, on the first call; every later
    /// call is an in-memory, case-insensitive lookup. A directory fetch or
    /// parse failure propagates: nothing can resolve without it.
    async fn resolve_cik(&self, ticker: &str) -> anyhow::Result<Option<String>> {
        self.ticker_map
            .resolve(ticker, || self.fetch_ticker_map())
            .await
    }

    /// Fetch the company's submission history and select its latest 10-K.
    ///
    /// Transport or parse failures are soft: logged and collapsed to `None`,
    /// so one dead company does not end the batch.
    async fn latest_10k(&self, cik: &str) -> Option<Filing> {
        let url = format!("https://data.sec.gov/submissions/CIK{cik}.json");

        let response = match self.get(&url).await {
            Ok(response) => response,
            Err(err) => {
                error!("failed to fetch submission history for CIK {cik}, error({err})");
                return None;
            }
        };

        let history: submissions::Submissions = match response.json().await {
            Ok(history) => history,
            Err(err) => {
                error!("failed to parse submission history for CIK {cik}, error({err})");
                return None;
            }
        };

        history.filings.recent.latest_10k(cik)
    }

    /// Download the raw text body of a filing document. Failures propagate.
    async fn download_doc(&self, url: &str) -> anyhow::Result<String> {
        debug!("downloading document from {url}");
        let body = self.get(url).await?.text().await?;
        Ok(body)
    }
}

// rate gate
// ----------------------------------------------------------------------------

/// Serializes outbound requests: each caller waits until at least
/// `min_interval` has passed since the previous request started, whichever
/// operation issued it.
struct RateGate {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateGate {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let since = prev.elapsed();
            if since < self.min_interval {
                tokio::time::sleep(self.min_interval - since).await;
            }
        }
        *last = Some(Instant::now());
    }
}
