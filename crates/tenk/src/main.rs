mod cli;

// remote imports
use clap::Parser;
use cli::{Cli, TraceLevel};
use tenk_spider::config::Config;
use tenk_spider::pipeline;
use tenk_spider::render::PdfRenderer;
use tenk_spider::sec::SecClient;
use tracing::{subscriber, trace, Level};
use tracing_subscriber::FmtSubscriber;

////////////////////////////////////////////////////////////////////////////

const DEFAULT_TICKERS: [&str; 6] = ["AAPL", "META", "GOOGL", "AMZN", "NFLX", "GS"];

// set up the trace output
fn preprocess(trace_level: Level) {
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .finish();
    subscriber::set_global_default(my_subscriber).expect("Set subscriber");
}

////////////////////////////////////////////////////////////////////////////

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // set the trace level
    if let Some(trace_level) = cli.trace {
        preprocess(match trace_level {
            TraceLevel::DEBUG => Level::DEBUG,
            TraceLevel::ERROR => Level::ERROR,
            TraceLevel::INFO => Level::INFO,
            TraceLevel::TRACE => Level::TRACE,
            TraceLevel::WARN => Level::WARN,
        });
    }
    trace!("command line input recorded: {cli:?}");

    // if no trace level provided, use tui
    let tui = cli.trace.is_none();

    // read cli inputs
    use cli::Commands::*;
    match cli.command {
        // `tenk fetch <Option<Vec<String>>>`: collect & render 10-K reports
        Fetch { tickers } => {
            let tickers: Vec<String> = match tickers {
                Some(tickers) => tickers,
                None => DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            };

            let config = Config::from_env()?;
            let client = SecClient::new(&config.user_agent, config.rate_limit)?;
            let renderer = PdfRenderer::new(&config.user_agent)?;

            pipeline::fetch_10k_reports(&config, &tickers, &client, &renderer, tui).await?;
        }
    }

    Ok(())
}
