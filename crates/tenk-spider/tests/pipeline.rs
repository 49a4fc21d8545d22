use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tenk_spider::config::Config;
use tenk_spider::pipeline::{fetch_10k_reports, Registry};
use tenk_spider::render::{Render, RenderRequest};
use tenk_spider::sec::Filing;

// Batch semantics, driven end-to-end with stubbed registry & renderer.

struct StubRegistry {
    ciks: HashMap<String, String>,
    filings: HashMap<String, Filing>,
}

impl StubRegistry {
    fn with_t3() -> Self {
        // T1 resolves nowhere; T2 resolves but has no filing; T3 completes
        let mut ciks = HashMap::new();
        ciks.insert("T2".to_string(), "0000000002".to_string());
        ciks.insert("T3".to_string(), "0000000003".to_string());

        let mut filings = HashMap::new();
        filings.insert(
            "0000000003".to_string(),
            Filing {
                cik: "0000000003".to_string(),
                filing_date: NaiveDate::from_ymd_opt(2024, 2, 2).unwrap(),
                url: "https://www.sec.gov/Archives/edgar/data/3/000000000324000001/t3-10k.htm"
                    .to_string(),
            },
        );

        Self { ciks, filings }
    }
}

impl Registry for StubRegistry {
    async fn resolve_cik(&self, ticker: &str) -> anyhow::Result<Option<String>> {
        Ok(self.ciks.get(&ticker.to_uppercase()).cloned())
    }

    async fn latest_10k(&self, cik: &str) -> Option<Filing> {
        self.filings.get(cik).cloned()
    }

    async fn download_doc(&self, _url: &str) -> anyhow::Result<String> {
        Ok("<html><head></head><body>10-K</body></html>".to_string())
    }
}

struct StubRenderer {
    succeed: bool,
}

impl Render for StubRenderer {
    async fn render(&self, request: RenderRequest) -> bool {
        if self.succeed {
            if let Some(dir) = request.output_path.parent() {
                tokio::fs::create_dir_all(dir).await.unwrap();
            }
            tokio::fs::write(&request.output_path, b"%PDF-1.4 stub")
                .await
                .unwrap();
        }
        self.succeed
    }
}

fn test_config(dir: &Path) -> Config {
    Config {
        user_agent: "tenk tests test@example.com".to_string(),
        output_dir: dir.to_string_lossy().into_owned(),
        manifest_file: "filings_manifest.json".to_string(),
        rate_limit: Duration::from_millis(0),
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tenk-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn tickers(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn skipped_tickers_are_absent_from_the_manifest() {
    let dir = scratch_dir("skips");
    let config = test_config(&dir);
    let registry = StubRegistry::with_t3();
    let renderer = StubRenderer { succeed: true };

    let records = fetch_10k_reports(
        &config,
        &tickers(&["T1", "T2", "T3"]),
        &registry,
        &renderer,
        false,
    )
    .await
    .unwrap();

    // only T3 completed the whole pipeline
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].ticker, "T3");
    assert_eq!(records[0].cik, "0000000003");
    assert!(records[0].local_path.ends_with("T3_10K_2024-02-02.pdf"));
    assert!(Path::new(&records[0].local_path).exists());

    let manifest = std::fs::read_to_string(dir.join("filings_manifest.json")).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ticker"], "T3");
    assert_eq!(rows[0]["cik"], "0000000003");
    assert_eq!(rows[0]["filing_date"], "2024-02-02");
    assert_eq!(
        rows[0]["source_url"],
        "https://www.sec.gov/Archives/edgar/data/3/000000000324000001/t3-10k.htm"
    );
}

#[tokio::test]
async fn render_failure_skips_the_ticker() {
    let dir = scratch_dir("render-fail");
    let config = test_config(&dir);
    let registry = StubRegistry::with_t3();
    let renderer = StubRenderer { succeed: false };

    let records = fetch_10k_reports(&config, &tickers(&["T3"]), &registry, &renderer, false)
        .await
        .unwrap();

    assert!(records.is_empty());

    // the manifest is still written: an empty batch is a valid outcome
    let manifest = std::fs::read_to_string(dir.join("filings_manifest.json")).unwrap();
    let rows: serde_json::Value = serde_json::from_str(&manifest).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn reruns_are_deterministic() {
    let dir = scratch_dir("rerun");
    let config = test_config(&dir);
    let registry = StubRegistry::with_t3();
    let renderer = StubRenderer { succeed: true };

    let first = fetch_10k_reports(
        &config,
        &tickers(&["T1", "T3"]),
        &registry,
        &renderer,
        false,
    )
    .await
    .unwrap();
    let manifest_first = std::fs::read_to_string(dir.join("filings_manifest.json")).unwrap();

    let second = fetch_10k_reports(
        &config,
        &tickers(&["T1", "T3"]),
        &registry,
        &renderer,
        false,
    )
    .await
    .unwrap();
    let manifest_second = std::fs::read_to_string(dir.join("filings_manifest.json")).unwrap();

    // identical inputs, identical manifest, same overwritten output path
    assert_eq!(manifest_first, manifest_second);
    assert_eq!(first[0].local_path, second[0].local_path);

    let outputs: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "pdf"))
        .collect();
    assert_eq!(outputs.len(), 1, "no stale output files accumulate");
}
