use crate::model::StreamConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub viewer: ViewerConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    /// Initial stream settings; the viewer's settings surface may change them later
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Connect timeout for streams, total timeout for history requests
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// First reconnect delay after a dropped stream; doubles up to 60s
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,
    /// Treat a stream that stays silent this long as broken
    #[serde(default = "default_idle_timeout", with = "duration_format")]
    pub idle_timeout: Option<Duration>,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_idle_timeout() -> Option<Duration> {
    None
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            retry_interval: default_retry_interval(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Cap on the visible message sequence
    #[serde(default = "default_max_logs")]
    pub max_logs: usize,
    /// Quiet period before pending entries are flushed
    #[serde(default = "default_debounce", with = "humantime_serde")]
    pub debounce: Duration,
    /// Longest a pending entry may wait under continuous arrival
    #[serde(default = "default_max_wait", with = "humantime_serde")]
    pub max_wait: Duration,
}

fn default_max_logs() -> usize {
    600
}

fn default_debounce() -> Duration {
    Duration::from_millis(250)
}

fn default_max_wait() -> Duration {
    Duration::from_millis(1000)
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_logs: default_max_logs(),
            debounce: default_debounce(),
            max_wait: default_max_wait(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Number of oldest visible entries whose time span sizes the look-back window
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Look-back window used when fewer than `sample_size` entries are visible
    #[serde(default = "default_fallback_window", with = "humantime_serde")]
    pub fallback_window: Duration,
    /// Minimum entries requested per container when loading older logs
    #[serde(default = "default_min_entries")]
    pub min_entries: usize,
    /// Entries requested from each end of a skipped range
    #[serde(default = "default_skipped_page")]
    pub skipped_page: usize,
}

fn default_sample_size() -> usize {
    300
}

fn default_fallback_window() -> Duration {
    Duration::from_secs(600)
}

fn default_min_entries() -> usize {
    100
}

fn default_skipped_page() -> usize {
    100
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            fallback_window: default_fallback_window(),
            min_entries: default_min_entries(),
            skipped_page: default_skipped_page(),
        }
    }
}

// Optional durations in humantime notation, where "infinite" disables the limit
pub(crate) mod duration_format {
    use humantime_serde::re::humantime;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    const INFINITE: &str = "infinite";

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_str(INFINITE),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_limit(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_limit(s: &str) -> Result<Option<Duration>, String> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(INFINITE) {
            return Ok(None);
        }
        match humantime::parse_duration(s) {
            Ok(d) if d.is_zero() => Err("use 'infinite' instead of a zero duration".to_string()),
            Ok(d) => Ok(Some(d)),
            Err(e) => Err(format!("invalid duration '{}': {}", s, e)),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_limit() {
            assert_eq!(parse_limit("infinite").unwrap(), None);
            assert_eq!(parse_limit(" Infinite ").unwrap(), None);
            assert_eq!(parse_limit("45s").unwrap(), Some(Duration::from_secs(45)));
            assert_eq!(parse_limit("1m 30s").unwrap(), Some(Duration::from_secs(90)));
            assert!(parse_limit("0s").is_err());
            assert!(parse_limit("soon").is_err());
        }

        #[test]
        fn test_round_trips_through_yaml() {
            #[derive(serde::Serialize, serde::Deserialize)]
            struct Wrapper {
                #[serde(with = "super")]
                limit: Option<Duration>,
            }

            let yaml = serde_yaml::to_string(&Wrapper { limit: None }).unwrap();
            assert!(yaml.contains("infinite"));

            let parsed: Wrapper = serde_yaml::from_str("limit: 2m").unwrap();
            assert_eq!(parsed.limit, Some(Duration::from_secs(120)));
        }
    }
}
