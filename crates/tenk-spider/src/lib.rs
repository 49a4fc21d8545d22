pub mod config;
pub mod pipeline;
pub mod render;

/// US annual-report filings from the [SEC]; ticker resolution, submission
/// history and primary-document downloads, under one rate-limited client.
///
/// [SEC]: https://www.sec.gov/search-filings/edgar-application-programming-interfaces
pub mod sec;

mod tui;

/// Shortcut for required API elements.
pub(crate) mod http {
    pub(crate) use reqwest::Client as HttpClient;
}

/// Pretty-print the elapsed time since `time`.
pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    format!("elapsed time: {:.2}s", time.elapsed().as_secs_f64())
}
