use crate::output::is_quiet;
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::time::{Duration, Instant};

fn visible() -> bool {
    console::Term::stdout().is_term() && !is_quiet()
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = if visible() {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}

/// Row counter for import batches
pub struct RowProgress {
    pb: ProgressBar,
    started: Instant,
}

impl RowProgress {
    pub fn new(label: &str) -> Self {
        let pb = if visible() {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template("{msg} [{bar:30.cyan/blue}] {pos}/{len} rows") {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message(format!("{} {}", Icons::IMPORT, label));
        Self {
            pb,
            started: Instant::now(),
        }
    }

    /// Progress hook for the importer: `(done, total)`
    pub fn update(&self, done: usize, total: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_position(done as u64);
    }

    pub fn finish(&self, summary: &str) {
        self.pb.finish_and_clear();
        if is_quiet() {
            return;
        }
        println!(
            "{} {} {}",
            Icons::CHECK.style(theme().success.clone()),
            summary.style(theme().success.clone()),
            format!("in {}", HumanDuration(self.started.elapsed())).style(theme().dim.clone())
        );
    }
}
