#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the region map tools.
//!
//! [`IndicatifProgress`] renders acquisition progress as `indicatif` bars,
//! and [`init_logger`] routes `log` output through `indicatif-log-bridge`
//! so log lines do not tear the bars.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use region_map_acquisition::{ProgressCallback, ProgressEvent};

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once the batch count is known.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    fn spinner(multi: &MultiProgress, message: &str, color: &str) -> ProgressBar {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template(&format!("{{spinner:.{color}}} {{msg}}"))
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        bar
    }

    /// A bar for a partitioned fetch. Spins while counting, then shows
    /// batches done out of the total.
    #[must_use]
    pub fn batches_bar(multi: &MultiProgress, message: &str) -> Arc<Self> {
        let bar = Self::spinner(multi, message, "cyan");
        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }

    /// A bar driven by [`ProgressEvent`]s from a background load, where
    /// only a percentage is known.
    #[must_use]
    pub fn percent_bar(multi: &MultiProgress, message: &str) -> Arc<Self> {
        let bar = Self::spinner(multi, message, "yellow");
        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.yellow/dim} {percent}% [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }

    /// Applies one event from a background load.
    pub fn apply(&self, event: ProgressEvent) {
        if event.finished {
            self.bar.finish_with_message(event.message);
            return;
        }
        if let Some(percent) = event.percent {
            if self.bar.length().is_none() {
                self.set_total(100);
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let position = percent.clamp(0.0, 100.0).round() as u64;
            self.bar.set_position(position);
        }
        self.bar.set_message(event.message);
    }

    /// Removes the bar from the terminal.
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set in tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
