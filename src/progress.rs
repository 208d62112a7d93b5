//! Terminal progress for batch operations.
//!
//! The batch runner only sends [`ProgressEvent`]s; this module owns the bar and
//! drains the channel on its own thread.

use crate::domain::ProgressEvent;
use crossbeam_channel::{Receiver, Sender, unbounded};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

pub struct ProgressRenderer {
    bar: Option<ProgressBar>,
    visible: bool,
}

impl ProgressRenderer {
    /// Draws to stderr; indicatif hides the bar when stderr is not a terminal
    pub fn new() -> Self {
        Self {
            bar: None,
            visible: true,
        }
    }

    pub fn hidden() -> Self {
        Self {
            bar: None,
            visible: false,
        }
    }

    pub fn handle(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started {
                repo,
                position,
                total,
            } => {
                let bar = self.bar_for(total);
                bar.set_message(repo.to_string());
                debug!("[{}/{}] {}", position, total, repo);
            }
            ProgressEvent::Finished {
                repo,
                label,
                ok,
                completed,
                total,
            } => {
                let bar = self.bar_for(total);
                bar.set_position(completed as u64);
                let mark = if ok { "✓" } else { "✗" };
                bar.println(format!("{mark} {repo}: {label}"));
                if !ok {
                    warn!("{}: {}", repo, label);
                }
            }
            ProgressEvent::BatchCompleted { total } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                debug!("Batch of {} finished", total);
            }
        }
    }

    /// Position of the current bar, if a batch is running
    pub fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(ProgressBar::position)
    }

    fn bar_for(&mut self, total: usize) -> &ProgressBar {
        let visible = self.visible;
        self.bar.get_or_insert_with(|| {
            let target = if visible {
                ProgressDrawTarget::stderr()
            } else {
                ProgressDrawTarget::hidden()
            };
            let bar = ProgressBar::with_draw_target(Some(total as u64), target);
            bar.set_style(bar_style());
            bar
        })
    }

    /// Consume events until every sender is dropped
    pub fn drain(mut self, events: Receiver<ProgressEvent>) {
        for event in events {
            self.handle(event);
        }
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Start a renderer thread; join the handle after dropping every sender clone
pub fn spawn(renderer: ProgressRenderer) -> (Sender<ProgressEvent>, JoinHandle<()>) {
    let (tx, rx) = unbounded();
    let handle = thread::spawn(move || renderer.drain(rx));
    (tx, handle)
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}
