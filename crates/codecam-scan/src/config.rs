use codecam_sample::Viewport;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What to do when the platform reports the stream inactive mid-scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveStreamPolicy {
    /// Stop scheduling cycles but keep the stream and state untouched.
    Halt,
    /// Treat it like a missing track and try again after the interval.
    Retry,
    /// Report [`crate::ScanError::StreamInactive`] and stop the scanner.
    #[default]
    Stop,
}

/// Configuration for the scan loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Delay between finishing one cycle and starting the next
    pub scan_interval_ms: u64,
    /// Give up on a decode after this long and treat it as "nothing found"
    pub decode_timeout_ms: Option<u64>,
    /// Display area frames are sampled at
    pub viewport: Viewport,
    pub on_inactive_stream: InactiveStreamPolicy,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 1,
            decode_timeout_ms: None,
            viewport: Viewport::default(),
            on_inactive_stream: InactiveStreamPolicy::default(),
        }
    }
}

impl ScannerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn decode_timeout(&self) -> Option<Duration> {
        self.decode_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_scan_every_millisecond() {
        let config = ScannerConfig::default();
        assert_eq!(config.scan_interval(), Duration::from_millis(1));
        assert_eq!(config.decode_timeout(), None);
        assert_eq!(config.on_inactive_stream, InactiveStreamPolicy::Stop);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ScannerConfig::from_json(
            r#"{ "decode_timeout_ms": 250, "on_inactive_stream": "retry" }"#,
        )
        .unwrap();
        assert_eq!(config.decode_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.on_inactive_stream, InactiveStreamPolicy::Retry);
        assert_eq!(config.scan_interval_ms, 1);
        assert_eq!(config.viewport, Viewport::default());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "scan_interval_ms": 5, "viewport": {{ "width": 800, "height": 600 }} }}"#).unwrap();

        let config = ScannerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.scan_interval_ms, 5);
        assert_eq!(config.viewport, Viewport::new(800, 600));
    }

    #[test]
    fn bad_json_is_reported() {
        assert!(matches!(ScannerConfig::from_json("{"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            ScannerConfig::from_path("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
