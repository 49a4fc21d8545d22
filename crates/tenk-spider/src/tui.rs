use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Batch progress: one bar for overall position, one for recorded tickers,
/// one for skips. Hidden when tracing output is wanted instead.
pub(crate) struct Bars {
    total: ProgressBar,
    recorded: ProgressBar,
    skipped: ProgressBar,
    _multi: Option<MultiProgress>,
}

impl Bars {
    pub(crate) fn new(len: usize) -> anyhow::Result<Self> {
        let multi = MultiProgress::new();

        let total = multi.add(
            ProgressBar::new(len as u64).with_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.magenta}\n \
                         {msg:>9.white} |{bar:40.white/grey}| {pos:<2} / {human_len} \
                         [Time: {elapsed}, ETA: {eta}]",
                    )?
                    .progress_chars("## "),
            ),
        );
        total.set_message("total");
        total.enable_steady_tick(Duration::from_millis(100));

        let recorded = multi.insert_after(
            &total,
            ProgressBar::new(len as u64).with_style(
                ProgressStyle::default_bar()
                    .template(" {msg:>9.green} |{bar:40.green}| {pos:<2.green}")?
                    .progress_chars("## "),
            ),
        );
        recorded.set_message("recorded");

        let skipped = multi.insert_after(
            &recorded,
            ProgressBar::new(len as u64).with_style(
                ProgressStyle::default_bar()
                    .template(" {msg:>9.red} |{bar:40.red}| {pos:<2.red}")?
                    .progress_chars("## "),
            ),
        );
        skipped.set_message("skipped");

        Ok(Self {
            total,
            recorded,
            skipped,
            _multi: Some(multi),
        })
    }

    pub(crate) fn hidden() -> Self {
        Self {
            total: ProgressBar::hidden(),
            recorded: ProgressBar::hidden(),
            skipped: ProgressBar::hidden(),
            _multi: None,
        }
    }

    pub(crate) fn tick(&self) {
        self.total.inc(1);
    }

    pub(crate) fn record(&self) {
        self.recorded.inc(1);
    }

    pub(crate) fn skip(&self) {
        self.skipped.inc(1);
    }

    pub(crate) fn finish(&self) {
        self.total.finish_and_clear();
        self.recorded.finish_and_clear();
        self.skipped.finish_and_clear();
    }
}
