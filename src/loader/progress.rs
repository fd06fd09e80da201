//! Load progress display
//!
//! Side effect only: the graph is identical with or without it.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Redraw every this many records
const TICK_EVERY: usize = 10_000;

pub(crate) struct LoadProgress {
    bar: ProgressBar,
}

impl LoadProgress {
    /// `total` is the record count when it is known up front.
    pub(crate) fn new(enabled: bool, total: Option<usize>) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }
        let bar = match total {
            Some(n) => {
                let bar = ProgressBar::new(n as u64);
                bar.set_style(create_bar_style());
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(create_spinner_style());
                bar.enable_steady_tick(Duration::from_millis(120));
                bar
            }
        };
        bar.set_message("Loading objects...");
        Self { bar }
    }

    #[inline]
    pub(crate) fn record(&self, count: usize) {
        if count.is_multiple_of(TICK_EVERY) {
            self.bar.set_position(count as u64);
            if self.bar.length().is_none() {
                self.bar.set_message(format!("Loading objects... {}", count));
            }
        }
    }

    pub(crate) fn finish(&self, objects: usize, duplicates: usize) {
        let dup_msg = if duplicates > 0 {
            format!(" ({} duplicate addresses)", duplicates)
        } else {
            String::new()
        };
        self.bar.finish_with_message(format!(
            "{}Loaded {} objects{}",
            style("✓ ").green(),
            style(objects).cyan(),
            style(dup_msg).dim(),
        ));
    }
}

pub(crate) fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .expect("valid template")
}

pub(crate) fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .expect("valid template")
        .progress_chars("█▓▒░  ")
}
