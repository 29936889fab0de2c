//! Transfer progress display
//!
//! Drives an indicatif progress bar from the download progress sink. When stderr is not a
//! terminal the bar is disabled and progress is only logged at completion.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use crate::app::request::ProgressSink;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} {bytes} ({bytes_per_sec})";

/// Progress bar for a single transfer
#[derive(Debug, Clone)]
pub struct TransferProgress {
    bar: Option<ProgressBar>,
}

impl TransferProgress {
    /// Progress bar labelled `label`, shown only when stderr is a terminal
    pub fn new(label: &str) -> Self {
        Self::with_terminal(label, atty::is(atty::Stream::Stderr))
    }

    fn with_terminal(label: &str, is_terminal: bool) -> Self {
        if !is_terminal {
            debug!("Progress display disabled: stderr is not a terminal");
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(label.to_string());
        Self { bar: Some(bar) }
    }

    pub fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    /// Sink that feeds this bar; switches to a bounded bar once a length is known
    pub fn sink(&self) -> ProgressSink {
        let bar = self.bar.clone();
        ProgressSink::new(move |_written, total, expected| {
            let Some(bar) = &bar else {
                return;
            };
            if expected >= 0 && bar.length() != Some(expected as u64) {
                bar.set_length(expected as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
            }
            bar.set_position(total.max(0) as u64);
        })
    }

    /// Finish with a closing message
    pub fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }

    /// Remove the bar without a message
    pub fn clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
