use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Run waiting & answer streaming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunsConfig {
    /// Delay between run status polls.
    #[serde(default = "d_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up waiting after this many seconds. Unset waits until the run
    /// finishes, however long that takes.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// Pause between streamed characters.
    #[serde(default = "d_stream_delay_ms")]
    pub stream_delay_ms: u64,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: d_poll_interval_ms(),
            deadline_secs: None,
            stream_delay_ms: d_stream_delay_ms(),
        }
    }
}

impl RunsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn stream_delay(&self) -> Duration {
        Duration::from_millis(self.stream_delay_ms)
    }
}

fn d_poll_interval_ms() -> u64 {
    5_000
}
fn d_stream_delay_ms() -> u64 {
    50
}
