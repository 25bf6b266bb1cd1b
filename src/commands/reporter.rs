use crate::core::events::{format_bytes, InstallEvent, InstallObserver};
use indicatif::{ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::time::Duration;

/// Prints install progress to the terminal, with a progress bar while the
/// archive downloads.
#[derive(Default)]
pub struct ConsoleReporter {
    bar: RefCell<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn start_bar(&self, total: Option<u64>) {
        let bar = match total {
            Some(_) => {
                let bar = ProgressBar::new(100);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("  [{bar:40.cyan/blue}] {pos:>3}% {msg}")
                {
                    bar.set_style(style.progress_chars("#>-"));
                }
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner} {msg}") {
                    bar.set_style(style);
                }
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        *self.bar.borrow_mut() = Some(bar);
    }

    /// Print above the bar when one is showing.
    fn line(&self, text: &str) {
        match self.bar.borrow().as_ref() {
            Some(bar) => bar.println(text),
            None => println!("{text}"),
        }
    }

    fn finish_bar(&self, message: String) {
        if let Some(bar) = self.bar.borrow_mut().take() {
            bar.finish_with_message(message);
        }
    }
}

impl InstallObserver for ConsoleReporter {
    fn notify(&self, event: &InstallEvent) {
        match event {
            InstallEvent::LinkFound { url, version } => {
                println!("📦 Found PostgreSQL {version}");
                println!("   {url}");
            }
            InstallEvent::DownloadStarted { total, .. } => {
                match total {
                    Some(total) => println!("⬇️  Downloading {}...", format_bytes(*total)),
                    None => println!("⬇️  Downloading..."),
                }
                self.start_bar(*total);
            }
            InstallEvent::DownloadProgress { percent } => {
                if let Some(bar) = self.bar.borrow().as_ref() {
                    bar.set_position(u64::from(*percent));
                }
            }
            InstallEvent::DownloadHeartbeat { transferred } => {
                if let Some(bar) = self.bar.borrow().as_ref() {
                    bar.set_message(format_bytes(*transferred));
                }
            }
            InstallEvent::DownloadCompleted { transferred } => {
                self.finish_bar(format!("done ({})", format_bytes(*transferred)));
            }
            InstallEvent::ExtractingFile { .. } => {}
            InstallEvent::FileExtracted { name, bytes } => {
                self.line(&format!("   ✅ {name} ({})", format_bytes(*bytes)));
            }
            InstallEvent::PathRegistered { .. } => println!("🛣️  {event}"),
            InstallEvent::Failed { message } => {
                if let Some(bar) = self.bar.borrow_mut().take() {
                    bar.abandon();
                }
                eprintln!("❌ {message}");
            }
        }
    }
}
