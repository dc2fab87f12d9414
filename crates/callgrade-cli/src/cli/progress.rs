//! Progress display for batch scoring.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use callgrade::batch::BatchEvent;

/// Renders [`BatchEvent`]s as a progress bar with one line per finished call.
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_message("Scoring");
        Self { bar }
    }

    /// Consume events until the sender side is dropped.
    pub fn spawn(self, mut rx: mpsc::Receiver<BatchEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.handle(event);
            }
            self.bar.finish_and_clear();
        })
    }

    fn handle(&self, event: BatchEvent) {
        match event {
            BatchEvent::ItemStarted {
                index,
                total,
                label,
            } => {
                self.bar.set_length(total as u64);
                self.bar.println(format!(
                    "  {} [{}/{}] {}",
                    style("→").dim(),
                    index,
                    total,
                    label
                ));
            }
            BatchEvent::ItemSucceeded { call_id, grade } => {
                self.bar.inc(1);
                self.bar.println(format!(
                    "  {} {} grade {:.1}",
                    style("✓").green(),
                    call_id,
                    grade
                ));
            }
            BatchEvent::ItemFailed { call_id, error } => {
                self.bar.inc(1);
                self.bar.println(format!(
                    "  {} {} {}",
                    style("✗").red(),
                    call_id,
                    style(error).dim()
                ));
            }
        }
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}
