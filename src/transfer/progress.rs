// Progress display
use indicatif::{ProgressBar, ProgressStyle};
use log::trace;
use std::time::{Duration, Instant};

pub struct ProgressTracker {
    progress_bar: ProgressBar,
    description: String,
    transferred_bytes: u64,
    start_time: Instant,
    last_update_time: Instant,
    last_bytes: u64,
}

impl ProgressTracker {
    pub fn new(description: &str) -> Self {
        Self::with_bar(ProgressBar::new(0), description)
    }

    #[cfg(test)]
    fn hidden(description: &str) -> Self {
        Self::with_bar(ProgressBar::hidden(), description)
    }

    fn with_bar(progress_bar: ProgressBar, description: &str) -> Self {
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}",
        ) {
            progress_bar.set_style(style.progress_chars("#>-"));
        }
        progress_bar.set_message(description.to_string());

        let now = Instant::now();
        Self {
            progress_bar,
            description: description.to_string(),
            transferred_bytes: 0,
            start_time: now,
            last_update_time: now,
            last_bytes: 0,
        }
    }

    pub fn update(&mut self, bytes_transferred: u64, total: u64) {
        if self.progress_bar.length() != Some(total) {
            self.progress_bar.set_length(total);
        }
        self.transferred_bytes = bytes_transferred;
        self.progress_bar.set_position(bytes_transferred);
        trace!(
            "{}'s progress: {:.2}%",
            self.description,
            percent(bytes_transferred, total)
        );

        self.update_speed(bytes_transferred);
    }

    #[cfg(test)]
    fn transferred(&self) -> u64 {
        self.transferred_bytes
    }

    pub fn finish(&self) {
        let elapsed = self.start_time.elapsed();
        let total = self.transferred_bytes;

        let avg_speed = if elapsed.as_secs() > 0 {
            total / elapsed.as_secs()
        } else {
            total
        };

        self.progress_bar.finish_with_message(format!(
            "{} done (avg speed: {})",
            self.description,
            format_speed(avg_speed)
        ));
    }

    pub fn finish_with_error(&self, error: &str) {
        self.progress_bar
            .abandon_with_message(format!("{} failed: {}", self.description, error));
    }

    // Refresh the speed at most every 200ms.
    fn update_speed(&mut self, current_bytes: u64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update_time);

        if elapsed >= Duration::from_millis(200) {
            let bytes_diff = current_bytes.saturating_sub(self.last_bytes);
            let speed = (bytes_diff as f64 / elapsed.as_secs_f64()) as u64;

            self.progress_bar
                .set_message(format!("{} {}", self.description, format_speed(speed)));

            self.last_update_time = now;
            self.last_bytes = current_bytes;
        }
    }
}

/// Share of `total` already sent; an empty file counts as complete.
pub fn percent(sent: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        sent as f64 / total as f64 * 100.0
    }
}

fn format_speed(bytes_per_sec: u64) -> String {
    if bytes_per_sec < 1024 {
        format!("{} B/s", bytes_per_sec)
    } else if bytes_per_sec < 1024 * 1024 {
        format!("{:.2} KB/s", bytes_per_sec as f64 / 1024.0)
    } else if bytes_per_sec < 1024 * 1024 * 1024 {
        format!("{:.2} MB/s", bytes_per_sec as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB/s", bytes_per_sec as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
