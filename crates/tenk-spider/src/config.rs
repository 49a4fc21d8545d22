use dotenv::var;
use std::time::Duration;

// SEC rate limit is 10 req/sec; 150ms between request starts stays well
// under it (~6-7 req/sec).
const DEFAULT_RATE_LIMIT_MS: u64 = 150;

const DEFAULT_OUTPUT_DIR: &str = "data/10k_reports";
const DEFAULT_MANIFEST_FILE: &str = "filings_manifest.json";

/// Runtime settings, read from the environment (`.env` supported).
///
/// `USER_AGENT` is mandatory: the SEC rejects or throttles clients without a
/// contact-bearing identity string, e.g. `"Jane's Service jane@example.com"`.
#[derive(Clone, Debug)]
pub struct Config {
    pub user_agent: String,
    pub output_dir: String,
    pub manifest_file: String,
    pub rate_limit: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let user_agent = var("USER_AGENT")
            .map_err(|_| anyhow::anyhow!("environment variable USER_AGENT is required"))?;

        let rate_limit_ms = match var("RATE_LIMIT_MS") {
            Ok(ms) => ms.parse::<u64>().map_err(|err| {
                anyhow::anyhow!("RATE_LIMIT_MS must be an integer number of milliseconds: {err}")
            })?,
            Err(_) => DEFAULT_RATE_LIMIT_MS,
        };

        Ok(Self {
            user_agent,
            output_dir: var("OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()),
            manifest_file: var("MANIFEST_FILE")
                .unwrap_or_else(|_| DEFAULT_MANIFEST_FILE.to_string()),
            rate_limit: Duration::from_millis(rate_limit_ms),
        })
    }
}
