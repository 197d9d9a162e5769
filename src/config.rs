use std::env;
use std::time::Duration;

use tracing::warn;

/// How long `execute` waits for a reply before giving up.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Upper bound for a single buffered reply.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub response_timeout: Duration,
    /// `None` leaves the connect attempt to the operating system's own timeout.
    pub connect_timeout: Option<Duration>,
    pub max_frame_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            connect_timeout: None,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl LinkConfig {
    /// Default configuration with `MAX_FRAME_SIZE` taken from the environment when it is set.
    pub fn from_env() -> Self {
        let mut config = LinkConfig::default();
        if let Ok(value) = env::var("MAX_FRAME_SIZE") {
            config.max_frame_size = parse_max_frame_size(&value);
        }
        config
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

fn parse_max_frame_size(value: &str) -> usize {
    match value.trim().parse::<usize>() {
        Ok(size) if size > 0 => size,
        _ => {
            warn!(value, "ignoring invalid MAX_FRAME_SIZE");
            DEFAULT_MAX_FRAME_SIZE
        }
    }
}
