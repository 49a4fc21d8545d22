use crate::config::Config;
use crate::render::{Render, RenderRequest};
use crate::sec::Filing;
use crate::tui::Bars;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What the batch needs from the filings registry. [`crate::sec::SecClient`]
/// is the real implementation; tests stub it.
#[allow(async_fn_in_trait)]
pub trait Registry {
    /// Ticker -> zero-padded CIK. `Ok(None)` means the ticker is unknown;
    /// `Err` only when the directory itself cannot be built.
    async fn resolve_cik(&self, ticker: &str) -> anyhow::Result<Option<String>>;

    /// Latest annual filing for a CIK; `None` covers "no filing on record"
    /// and transport failures alike.
    async fn latest_10k(&self, cik: &str) -> Option<Filing>;

    /// Raw primary-document body; failures propagate.
    async fn download_doc(&self, url: &str) -> anyhow::Result<String>;
}

/// One manifest row. Only tickers that made it through the whole pipeline
/// get one; skipped tickers are absent, not error-marked.
#[derive(Clone, Debug, Serialize)]
pub struct OutcomeRecord {
    pub ticker: String,
    pub cik: String,
    pub filing_date: chrono::NaiveDate,
    pub local_path: String,
    pub source_url: String,
}

/// Why a ticker fell out of the batch.
#[derive(Debug, thiserror::Error)]
pub enum Skip {
    #[error("ticker not found in the SEC company directory")]
    UnknownTicker,
    #[error("no 10-K filing on record")]
    NoFiling,
    #[error("failed to render the filing to PDF")]
    RenderFailed,
}

/// Fetch, render and record the latest 10-K for each ticker, strictly in
/// order, one at a time. Skips are logged and omitted from the manifest;
/// only a directory-bootstrap or document-download failure ends the batch.
///
/// The manifest is written exactly once, after the last ticker.
pub async fn fetch_10k_reports<R, D>(
    config: &Config,
    tickers: &[String],
    registry: &R,
    renderer: &D,
    tui: bool,
) -> anyhow::Result<Vec<OutcomeRecord>>
where
    R: Registry,
    D: Render,
{
    let time = std::time::Instant::now();
    info!("starting 10-K batch for {} tickers", tickers.len());
    if tui {
        println!(
            "{bar}\n{name:^40}\n{bar}",
            bar = "=".repeat(40),
            name = "SEC 10-K Reports"
        );
    }
    let bars = if tui {
        Bars::new(tickers.len())?
    } else {
        Bars::hidden()
    };

    let mut records = Vec::new();
    for ticker in tickers {
        match process_ticker(config, registry, renderer, ticker).await? {
            Ok(record) => {
                info!("{ticker} recorded, saved to {}", record.local_path);
                records.push(record);
                bars.record();
            }
            Err(skip) => {
                warn!("skipping {ticker}: {skip}");
                bars.skip();
            }
        }
        bars.tick();
    }
    bars.finish();

    write_manifest(config, &records).await?;

    info!(
        "batch complete: {} of {} tickers recorded, {}",
        records.len(),
        tickers.len(),
        crate::time_elapsed(time)
    );
    if tui {
        println!(
            "batch complete: {} of {} tickers recorded",
            records.len(),
            tickers.len()
        );
    }

    Ok(records)
}

/// One ticker through the machine: resolve -> select -> download -> render.
/// The inner `Err(Skip)` abandons the ticker; the outer `Err` ends the run.
async fn process_ticker<R, D>(
    config: &Config,
    registry: &R,
    renderer: &D,
    ticker: &str,
) -> anyhow::Result<Result<OutcomeRecord, Skip>>
where
    R: Registry,
    D: Render,
{
    debug!("processing {ticker}");

    let cik = match registry.resolve_cik(ticker).await? {
        Some(cik) => cik,
        None => return Ok(Err(Skip::UnknownTicker)),
    };

    let filing = match registry.latest_10k(&cik).await {
        Some(filing) => filing,
        None => return Ok(Err(Skip::NoFiling)),
    };

    let output_path = output_path(&config.output_dir, ticker, &filing);

    let html = registry.download_doc(&filing.url).await?;

    let rendered = renderer
        .render(RenderRequest {
            html,
            source_url: filing.url.clone(),
            output_path: output_path.clone(),
        })
        .await;
    if !rendered {
        return Ok(Err(Skip::RenderFailed));
    }

    Ok(Ok(OutcomeRecord {
        ticker: ticker.to_string(),
        cik: filing.cik,
        filing_date: filing.filing_date,
        local_path: output_path.to_string_lossy().into_owned(),
        source_url: filing.url,
    }))
}

/// `{output_dir}/{ticker}_10K_{date}.pdf`; constant for a given filing, so
/// re-runs overwrite rather than accumulate.
fn output_path(output_dir: &str, ticker: &str, filing: &Filing) -> PathBuf {
    Path::new(output_dir).join(format!("{ticker}_10K_{}.pdf", filing.filing_date))
}

/// Serialize the batch outcome, pretty-printed, replacing any prior
/// manifest at the same path.
async fn write_manifest(config: &Config, records: &[OutcomeRecord]) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.output_dir).await?;
    let path = Path::new(&config.output_dir).join(&config.manifest_file);
    let body = serde_json::to_vec_pretty(records)?;
    tokio::fs::write(&path, body).await?;
    debug!("manifest written to {}", path.display());
    Ok(())
}
