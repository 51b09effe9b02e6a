use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the transcript engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcript panel activation timing
    pub activation: ActivationConfig,

    /// Extraction strategy settings
    pub extraction: ExtractionConfig,

    /// Coordinator/extractor channel settings
    pub protocol: ProtocolConfig,

    /// Batch collection settings
    pub batch: BatchConfig,

    /// Live page fetching settings
    pub http: HttpConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Interval between panel checks (ms)
    pub poll_interval_ms: u64,

    /// Total bounded wait for the panel to populate (ms)
    pub timeout_ms: u64,

    /// Pause after a simulated gesture (ms)
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// How long to poll for track cues after forcing a track to show (ms)
    pub track_wait_ms: u64,

    /// Interval between cue checks (ms)
    pub track_poll_ms: u64,

    /// Minimum characters for a panel entry remainder
    pub min_entry_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Delay between installing the extractor and retrying a request (ms)
    pub install_settle_ms: u64,

    /// Capacity of the request channel
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Interval between page-identity checks after navigating (ms)
    pub navigation_poll_ms: u64,

    /// Bounded wait for the page to change (ms)
    pub navigation_timeout_ms: u64,

    /// Transcripts longer than this are truncated before storage
    pub max_transcript_chars: usize,

    /// "Next" clicks allowed while looking for the expected lecture
    #[serde(default = "default_navigation_hops")]
    pub max_navigation_hops: usize,

    /// Persisted run state file (None = in-memory only)
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// User agent sent with page requests
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base output directory
    pub base_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Keep timestamps in plain-text transcripts
    pub include_timestamps: bool,
}

impl ActivationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl ExtractionConfig {
    pub fn track_wait(&self) -> Duration {
        Duration::from_millis(self.track_wait_ms)
    }

    pub fn track_poll(&self) -> Duration {
        Duration::from_millis(self.track_poll_ms)
    }
}

impl ProtocolConfig {
    pub fn install_settle(&self) -> Duration {
        Duration::from_millis(self.install_settle_ms)
    }
}

impl BatchConfig {
    pub fn navigation_poll(&self) -> Duration {
        Duration::from_millis(self.navigation_poll_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_paths = [
            "coursescribe.toml",
            "config/coursescribe.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config = toml::from_str(&config_str)?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(timeout) = std::env::var("COURSESCRIBE_ACTIVATION_TIMEOUT_MS") {
            config.activation.timeout_ms = timeout.parse().unwrap_or(config.activation.timeout_ms);
        }

        if let Ok(timeout) = std::env::var("COURSESCRIBE_NAVIGATION_TIMEOUT_MS") {
            config.batch.navigation_timeout_ms =
                timeout.parse().unwrap_or(config.batch.navigation_timeout_ms);
        }

        if let Ok(max_chars) = std::env::var("COURSESCRIBE_MAX_TRANSCRIPT_CHARS") {
            config.batch.max_transcript_chars =
                max_chars.parse().unwrap_or(config.batch.max_transcript_chars);
        }

        if let Ok(state_file) = std::env::var("COURSESCRIBE_STATE_FILE") {
            config.batch.state_file = Some(PathBuf::from(state_file));
        }

        if let Ok(output_dir) = std::env::var("COURSESCRIBE_OUTPUT_DIR") {
            config.output.base_dir = PathBuf::from(output_dir);
        }

        if let Ok(log_level) = std::env::var("COURSESCRIBE_LOG_LEVEL") {
            config.output.log_level = log_level;
        }

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.activation.poll_interval_ms == 0 || self.batch.navigation_poll_ms == 0 {
            return Err(anyhow!("poll intervals must be greater than 0"));
        }

        // Several polls must fit inside each bounded wait
        if self.activation.timeout_ms < self.activation.poll_interval_ms * 2 {
            return Err(anyhow!("activation timeout must cover at least two polls"));
        }

        if self.batch.navigation_timeout_ms < self.batch.navigation_poll_ms * 2 {
            return Err(anyhow!("navigation timeout must cover at least two polls"));
        }

        if self.batch.max_navigation_hops == 0 {
            return Err(anyhow!("max_navigation_hops must be greater than 0"));
        }

        if self.batch.max_transcript_chars == 0 {
            return Err(anyhow!("max_transcript_chars must be greater than 0"));
        }

        if self.protocol.channel_capacity == 0 {
            return Err(anyhow!("channel_capacity must be greater than 0"));
        }

        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Coursescribe Configuration:\n\
            - Activation: poll {}ms, timeout {}ms\n\
            - Track wait: {}ms\n\
            - Navigation: poll {}ms, timeout {}ms\n\
            - Max transcript chars: {}\n\
            - Max navigation hops: {}\n\
            - State file: {}",
            self.activation.poll_interval_ms,
            self.activation.timeout_ms,
            self.extraction.track_wait_ms,
            self.batch.navigation_poll_ms,
            self.batch.navigation_timeout_ms,
            self.batch.max_transcript_chars,
            self.batch.max_navigation_hops,
            self.batch
                .state_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
        )
    }
}

fn default_navigation_hops() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            activation: ActivationConfig {
                poll_interval_ms: 250,
                timeout_ms: 4000,
                settle_ms: 300,
            },
            extraction: ExtractionConfig {
                track_wait_ms: 1500,
                track_poll_ms: 100,
                min_entry_chars: 4,
            },
            protocol: ProtocolConfig {
                install_settle_ms: 500,
                channel_capacity: 8,
            },
            batch: BatchConfig {
                navigation_poll_ms: 250,
                navigation_timeout_ms: 10_000,
                max_transcript_chars: 500_000,
                max_navigation_hops: default_navigation_hops(),
                state_file: None,
            },
            http: HttpConfig {
                timeout_seconds: 30,
                user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            },
            output: OutputConfig {
                base_dir: PathBuf::from("./output"),
                log_level: "info".to_string(),
                include_timestamps: true,
            },
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_activation_timing(mut self, poll_ms: u64, timeout_ms: u64) -> Self {
        self.config.activation.poll_interval_ms = poll_ms;
        self.config.activation.timeout_ms = timeout_ms;
        self
    }

    pub fn with_settle_ms(mut self, settle_ms: u64) -> Self {
        self.config.activation.settle_ms = settle_ms;
        self.config.protocol.install_settle_ms = settle_ms;
        self
    }

    pub fn with_track_wait(mut self, poll_ms: u64, wait_ms: u64) -> Self {
        self.config.extraction.track_poll_ms = poll_ms;
        self.config.extraction.track_wait_ms = wait_ms;
        self
    }

    pub fn with_navigation_timing(mut self, poll_ms: u64, timeout_ms: u64) -> Self {
        self.config.batch.navigation_poll_ms = poll_ms;
        self.config.batch.navigation_timeout_ms = timeout_ms;
        self
    }

    pub fn with_navigation_hops(mut self, hops: usize) -> Self {
        self.config.batch.max_navigation_hops = hops;
        self
    }

    pub fn with_max_transcript_chars(mut self, max_chars: usize) -> Self {
        self.config.batch.max_transcript_chars = max_chars;
        self
    }

    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.config.batch.state_file = Some(path);
        self
    }

    /// Millisecond-scale timings for tests and offline replay
    pub fn fast(self) -> Self {
        self.with_activation_timing(5, 60)
            .with_settle_ms(1)
            .with_track_wait(5, 40)
            .with_navigation_timing(5, 60)
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.extraction.min_entry_chars, 4);
        assert_eq!(config.activation.timeout(), Duration::from_secs(4));
        assert!(config.batch.state_file.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_activation_timing(10, 100)
            .with_max_transcript_chars(1000)
            .build();

        assert_eq!(config.activation.poll_interval_ms, 10);
        assert_eq!(config.activation.timeout_ms, 100);
        assert_eq!(config.batch.max_transcript_chars, 1000);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());
        assert!(ConfigBuilder::new().fast().build().validate().is_ok());

        let config = ConfigBuilder::new().with_activation_timing(100, 150).build();
        assert!(config.validate().is_err());

        let config = ConfigBuilder::new().fast().with_navigation_hops(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_hops_take_default() {
        let mut value: toml::Value = toml::Value::try_from(Config::default()).unwrap();
        value["batch"].as_table_mut().unwrap().remove("max_navigation_hops");
        let parsed: Config = value.try_into().unwrap();
        assert_eq!(parsed.batch.max_navigation_hops, 10);
        assert!(parsed.summary().contains("Max navigation hops: 10"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ConfigBuilder::new()
            .with_state_file(PathBuf::from("run.json"))
            .build();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.batch.state_file, Some(PathBuf::from("run.json")));
        assert_eq!(parsed.activation.timeout_ms, config.activation.timeout_ms);
    }
}
