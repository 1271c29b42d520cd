use indicatif::{ProgressBar, ProgressStyle};
use penguinshift::{TransferPhase, TransferView};

#[derive(Debug)]
pub struct TransferProgress {
    bar: ProgressBar,
}

impl TransferProgress {
    pub fn new(transfer_id: u64) -> Self {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos:>3}% {msg}")
            .progress_chars("#-");
        bar.set_style(style);
        bar.set_prefix(format!("transfer {}", transfer_id));
        Self { bar }
    }

    pub fn update(&self, view: &TransferView) {
        self.bar.set_position(view.percent().clamp(0.0, 100.0).round() as u64);
        if let Some(job) = &view.job {
            self.bar.set_message(job.phase().to_string());
        }
    }

    pub fn finish(&self, view: &TransferView) {
        self.update(view);
        match &view.phase {
            TransferPhase::Completed => self.bar.finish_with_message(format!(
                "completed, {} songs",
                view.total_songs()
            )),
            TransferPhase::Failed { .. } => self.bar.abandon_with_message("failed"),
            TransferPhase::Errored { message, .. } => {
                self.bar.abandon_with_message(message.clone())
            }
            TransferPhase::Cancelled => self.bar.abandon_with_message("cancelled"),
            TransferPhase::Polling => {}
        }
    }
}
