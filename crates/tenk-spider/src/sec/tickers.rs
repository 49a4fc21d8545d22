use super::SecClient;
use serde::de::Visitor;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::OnceCell;
use tracing::{debug, error};

const TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// The lazily-built ticker -> CIK index.
pub(super) struct TickerDirectory {
    cell: OnceCell<HashMap<String, String>>,
}

impl TickerDirectory {
    pub(super) fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Case-insensitive lookup. `fetch` builds the index and runs at most
    /// once for the lifetime of the directory, however many resolutions
    /// follow; a fetch failure propagates to every caller.
    pub(super) async fn resolve<F, Fut>(
        &self,
        ticker: &str,
        fetch: F,
    ) -> anyhow::Result<Option<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<HashMap<String, String>>>,
    {
        let map = self.cell.get_or_try_init(fetch).await?;
        Ok(map.get(&ticker.to_uppercase()).cloned())
    }
}

impl SecClient {
    /// Fetch the full EDGAR company directory and index it by ticker.
    ///
    /// One bulk document covers every known ticker; `resolve_cik` caches the
    /// result so this runs at most once per client.
    pub(super) async fn fetch_ticker_map(&self) -> anyhow::Result<HashMap<String, String>> {
        debug!("fetching SEC Company Tickers");
        let tickers: Tickers = self
            .get(TICKERS_URL)
            .await
            .map_err(|err| {
                error!("failed to fetch SEC Company Tickers, error({err})");
                err
            })?
            .json()
            .await
            .map_err(|err| {
                error!("failed to parse SEC Company Tickers, error({err})");
                err
            })?;

        Ok(tickers.index())
    }
}

// de
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct Tickers(Vec<Ticker>);

#[derive(Clone, Debug, Deserialize)]
struct Ticker {
    #[serde(rename = "cik_str", deserialize_with = "de_cik")]
    cik: String,
    ticker: String,
}

/// The directory carries CIKs as bare integers; every other EDGAR endpoint
/// wants them zero-padded to 10 digits.
fn de_cik<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let cik = u64::deserialize(deserializer)?;
    Ok(format!("{cik:010}"))
}

struct TickerVisitor;

impl<'de> Visitor<'de> for TickerVisitor {
    type Value = Tickers;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("Map of tickers")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        // each entry is keyed by row number:
        // `0: { "cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc." },
        //  1: { ... },
        //  ...`
        let mut tickers: Vec<Ticker> = Vec::new();
        while let Some((_, ticker)) = map.next_entry::<u32, Ticker>()? {
            tickers.push(ticker);
        }
        Ok(Tickers(tickers))
    }
}

impl<'de> Deserialize<'de> for Tickers {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // we want a vector returned, but the deserialize will expect a map,
        // given how the API has been designed
        deserializer.deserialize_map(TickerVisitor)
    }
}

impl Tickers {
    /// Uppercase ticker -> zero-padded CIK.
    fn index(self) -> HashMap<String, String> {
        self.0
            .into_iter()
            .map(|entry| (entry.ticker.to_uppercase(), entry.cik))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "0": { "cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc." },
        "1": { "cik_str": 1326801, "ticker": "META", "title": "Meta Platforms, Inc." }
    }"#;

    #[test]
    fn directory_map_is_indexed_by_uppercase_ticker() {
        let tickers: Tickers = serde_json::from_str(SAMPLE).unwrap();
        let map = tickers.index();

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("AAPL").map(String::as_str), Some("0000320193"));
        assert_eq!(map.get("META").map(String::as_str), Some("0001326801"));
        assert!(map.get("MSFT").is_none());
    }

    #[test]
    fn ciks_are_zero_padded_to_ten_digits() {
        let tickers: Tickers = serde_json::from_str(SAMPLE).unwrap();
        for entry in &tickers.0 {
            assert_eq!(entry.cik.len(), 10);
        }
    }

    #[tokio::test]
    async fn directory_is_fetched_at_most_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let directory = TickerDirectory::new();
        let fetches = AtomicUsize::new(0);

        for ticker in ["aapl", "AAPL", "MSFT"] {
            let cik = directory
                .resolve(ticker, || {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    async {
                        let mut map = HashMap::new();
                        map.insert("AAPL".to_string(), "0000320193".to_string());
                        Ok(map)
                    }
                })
                .await
                .unwrap();
            assert_eq!(cik.is_some(), ticker.eq_ignore_ascii_case("AAPL"));
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
