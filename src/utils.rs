use std::{path::Path, time::Duration};

use rand::{thread_rng, Rng};
use tokio::io::AsyncBufReadExt;

/// Blank lines and `#` comments carry no data.
pub fn is_meaningful_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && !line.starts_with('#')
}

/// Reads trimmed, non-comment lines of a text file.
pub async fn read_file_lines(path: impl AsRef<Path>) -> eyre::Result<Vec<String>> {
    let file = tokio::fs::read(path).await?;
    let mut lines = file.lines();

    let mut contents = vec![];
    while let Some(line) = lines.next_line().await? {
        if is_meaningful_line(&line) {
            contents.push(line.trim().to_owned());
        }
    }

    Ok(contents)
}

/// Uniformly random pause between two wallets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Pacing {
    pub fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min_ms: min.saturating_mul(1000),
            max_ms: max.saturating_mul(1000),
        }
    }

    pub fn sample(&self) -> Duration {
        let (low, high) = if self.min_ms <= self.max_ms {
            (self.min_ms, self.max_ms)
        } else {
            (self.max_ms, self.min_ms)
        };

        Duration::from_millis(thread_rng().gen_range(low..=high))
    }

    pub async fn sleep(&self) {
        let delay = self.sample();
        tracing::info!("Sleeping for {:.1}s before the next wallet", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}
