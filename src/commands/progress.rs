// src/commands/progress.rs
//! Terminal progress for package builds

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use missionpack::ProgressListener;

/// Progress bar driven by the builder's percentage updates
pub struct BarProgress {
    bar: ProgressBar,
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl BarProgress {
    pub fn new(message: &str) -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.green/dim}] {percent}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_message(message.to_string());
        Self {
            bar,
            cancelled: AtomicBool::new(false),
            reason: Mutex::new(None),
        }
    }

    /// Finish the bar, leaving it on screen
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Remove the bar after a failure
    pub fn abandon(&self) {
        let reason = self.reason.lock().ok().and_then(|r| r.clone());
        match reason {
            Some(reason) => self.bar.abandon_with_message(format!("cancelled: {reason}")),
            None => self.bar.abandon(),
        }
    }
}

impl ProgressListener for BarProgress {
    fn publish(&self, percent: u8) {
        self.bar.set_position(u64::from(percent.min(100)));
    }

    fn cancel(&self, reason: &str) {
        if !self.cancelled.swap(true, Ordering::SeqCst)
            && let Ok(mut slot) = self.reason.lock()
        {
            *slot = Some(reason.to_string());
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
