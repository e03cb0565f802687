use crate::engine::LoopConfig;
use crate::error::{ProxyVoteError, Result};
use crate::models::{AnonymityLevel, FilterCriteria, VoteWindow};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Target endpoint
    pub target: TargetConfig,
    /// Proxy list and capability filter
    pub proxy: ProxyConfig,
    /// Vote window and pacing
    pub schedule: ScheduleConfig,
    /// Geolocation lookups
    pub geo: GeoConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct TargetConfig {
    /// Final URL, building id already applied
    pub url: Url,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Minimum anonymity level (default: elite)
    pub min_level: AnonymityLevel,
    /// Only keep HTTPS-capable proxies
    pub require_https: bool,
    /// Route the HTTPS leg through HTTPS-capable proxies
    pub route_https: bool,
    /// JSON file with raw proxy records
    pub list_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub window: VoteWindow,
    /// Upper bound of the random delay after a success, in seconds
    pub max_delay_secs: u64,
    /// Fixed delay after a failure, in seconds
    pub failure_backoff_secs: u64,
    /// Failures before the run stops
    pub max_failures: u64,
    /// Per-attempt request timeout in seconds
    pub request_timeout_secs: u64,
    /// Sleep after a full cycle of skipped proxies, in seconds
    pub idle_backoff_secs: u64,
    /// Consecutive all-skip cycles before stopping (0 = never)
    pub max_idle_cycles: u32,
}

#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Base URL of an ip-api.com compatible endpoint
    pub lookup_url: String,
    /// Concurrent lookups while building the catalog
    pub concurrency: usize,
    /// Per-lookup timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let window = VoteWindow::new(
            parse_env_or("VOTE_WINDOW_START", 8)?,
            parse_env_or("VOTE_WINDOW_END", 22)?,
        )?;

        let max_delay_secs: u64 = parse_env_or("VOTE_MAX_DELAY", 60)?;
        if max_delay_secs == 0 {
            return Err(ProxyVoteError::InvalidConfig(
                "VOTE_MAX_DELAY must be at least 1".into(),
            ));
        }

        let max_failures: u64 = parse_env_or("VOTE_MAX_FAILURES", 10)?;
        if max_failures == 0 {
            return Err(ProxyVoteError::InvalidConfig(
                "VOTE_MAX_FAILURES must be at least 1".into(),
            ));
        }

        let request_timeout_secs: u64 = parse_env_or("VOTE_REQUEST_TIMEOUT", 15)?;
        if request_timeout_secs == 0 {
            return Err(ProxyVoteError::InvalidConfig(
                "VOTE_REQUEST_TIMEOUT must be at least 1".into(),
            ));
        }

        let idle_backoff_secs: u64 = parse_env_or("VOTE_IDLE_BACKOFF", 60)?;
        if idle_backoff_secs == 0 {
            return Err(ProxyVoteError::InvalidConfig(
                "VOTE_IDLE_BACKOFF must be at least 1".into(),
            ));
        }

        let min_level = get_env_or("PROXY_MIN_LEVEL", "elite");
        let min_level = AnonymityLevel::from_str(&min_level).ok_or_else(|| {
            ProxyVoteError::InvalidConfig(format!(
                "PROXY_MIN_LEVEL must be transparent, anonymous or elite (got {})",
                min_level
            ))
        })?;

        Ok(Config {
            target: TargetConfig {
                url: parse_target_url()?,
            },
            proxy: ProxyConfig {
                min_level,
                require_https: parse_bool_env("PROXY_REQUIRE_HTTPS", false)?,
                route_https: parse_bool_env("PROXY_ROUTE_HTTPS", true)?,
                list_path: PathBuf::from(get_env_or("PROXY_LIST_PATH", "proxies.json")),
            },
            schedule: ScheduleConfig {
                window,
                max_delay_secs,
                failure_backoff_secs: parse_env_or("VOTE_FAILURE_BACKOFF", 30)?,
                max_failures,
                request_timeout_secs,
                idle_backoff_secs,
                max_idle_cycles: parse_env_or("VOTE_MAX_IDLE_CYCLES", 0)?,
            },
            geo: GeoConfig {
                lookup_url: get_env_or("GEO_LOOKUP_URL", "http://ip-api.com/json"),
                concurrency: parse_env_or::<usize>("GEO_CONCURRENCY", 4)?.max(1),
                timeout_secs: parse_env_or::<u64>("GEO_TIMEOUT", 10)?.max(1),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    pub fn filter_criteria(&self) -> FilterCriteria {
        FilterCriteria {
            min_anonymity: self.proxy.min_level,
            require_https: self.proxy.require_https,
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            target: self.target.url.clone(),
            window: self.schedule.window,
            max_delay_secs: self.schedule.max_delay_secs,
            failure_backoff: Duration::from_secs(self.schedule.failure_backoff_secs),
            max_failures: self.schedule.max_failures,
            route_https: self.proxy.route_https,
            idle_backoff: Duration::from_secs(self.schedule.idle_backoff_secs),
            max_idle_cycles: self.schedule.max_idle_cycles,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.schedule.request_timeout_secs)
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_secs(self.geo.timeout_secs)
    }
}

fn parse_target_url() -> Result<Url> {
    let raw = env::var("VOTE_TARGET_URL")
        .map_err(|_| ProxyVoteError::MissingEnvVar("VOTE_TARGET_URL".into()))?;

    let mut url = Url::parse(raw.trim()).map_err(|e| {
        ProxyVoteError::InvalidConfig(format!("VOTE_TARGET_URL must be a valid URL: {}", e))
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ProxyVoteError::InvalidConfig(format!(
                "VOTE_TARGET_URL has unsupported scheme: {}",
                other
            )))
        }
    }

    let building_id = env::var("VOTE_BUILDING_ID").unwrap_or_default();
    let building_id = building_id.trim();
    if !building_id.is_empty() {
        let id: u64 = building_id.parse().map_err(|_| {
            ProxyVoteError::InvalidConfig("VOTE_BUILDING_ID must be numeric".into())
        })?;
        let param = get_env_or("VOTE_BUILDING_PARAM", "id");
        url.query_pairs_mut().append_pair(&param, &id.to_string());
    }

    Ok(url)
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            ProxyVoteError::InvalidConfig(format!("{} has an invalid value: {}", key, raw))
        }),
        _ => Ok(default),
    }
}

fn parse_bool_env(key: &str, default: bool) -> Result<bool> {
    let raw = get_env_or(key, "");
    match raw.trim().to_lowercase().as_str() {
        "" => Ok(default),
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ProxyVoteError::InvalidConfig(format!(
            "{} must be a boolean (got {})",
            key, raw
        ))),
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "VOTE_TARGET_URL",
        "VOTE_BUILDING_ID",
        "VOTE_BUILDING_PARAM",
        "PROXY_MIN_LEVEL",
        "PROXY_REQUIRE_HTTPS",
        "PROXY_ROUTE_HTTPS",
        "PROXY_LIST_PATH",
        "VOTE_WINDOW_START",
        "VOTE_WINDOW_END",
        "VOTE_MAX_DELAY",
        "VOTE_FAILURE_BACKOFF",
        "VOTE_MAX_FAILURES",
        "VOTE_REQUEST_TIMEOUT",
        "VOTE_IDLE_BACKOFF",
        "VOTE_MAX_IDLE_CYCLES",
        "GEO_LOOKUP_URL",
        "GEO_CONCURRENCY",
        "GEO_TIMEOUT",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("VOTE_TARGET_URL", "https://vote.example/cast");
        let config = Config::from_env().unwrap();

        assert_eq!(config.target.url.as_str(), "https://vote.example/cast");
        assert_eq!(config.proxy.min_level, AnonymityLevel::Elite);
        assert!(!config.proxy.require_https);
        assert!(config.proxy.route_https);
        assert_eq!(config.proxy.list_path, PathBuf::from("proxies.json"));
        assert_eq!(config.schedule.window, VoteWindow::new(8, 22).unwrap());
        assert_eq!(config.schedule.failure_backoff_secs, 30);
        assert_eq!(config.schedule.max_failures, 10);
        assert_eq!(config.schedule.request_timeout_secs, 15);
        assert_eq!(config.schedule.max_idle_cycles, 0);
        assert_eq!(config.geo.lookup_url, "http://ip-api.com/json");
        assert_eq!(config.log.format, "pretty");

        let loop_config = config.loop_config();
        assert_eq!(loop_config.failure_backoff, Duration::from_secs(30));
        assert!(loop_config.target_is_https());
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("VOTE_TARGET_URL", "http://vote.example/cast?lang=en");
        env::set_var("VOTE_BUILDING_ID", "1234");
        env::set_var("VOTE_BUILDING_PARAM", "building");
        env::set_var("PROXY_MIN_LEVEL", "anonymous");
        env::set_var("PROXY_REQUIRE_HTTPS", "yes");
        env::set_var("PROXY_ROUTE_HTTPS", "false");
        env::set_var("VOTE_WINDOW_START", "10");
        env::set_var("VOTE_WINDOW_END", "20");
        env::set_var("VOTE_MAX_FAILURES", "3");
        env::set_var("GEO_CONCURRENCY", "0");

        let config = Config::from_env().unwrap();

        assert_eq!(
            config.target.url.as_str(),
            "http://vote.example/cast?lang=en&building=1234"
        );
        let criteria = config.filter_criteria();
        assert_eq!(criteria.min_anonymity, AnonymityLevel::Anonymous);
        assert!(criteria.require_https);
        assert!(!config.proxy.route_https);
        assert_eq!(config.schedule.window, VoteWindow::new(10, 20).unwrap());
        assert_eq!(config.loop_config().max_failures, 3);
        assert_eq!(config.geo.concurrency, 1);
    }

    #[test]
    fn test_config_requires_target_url() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ProxyVoteError::MissingEnvVar(_)));
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("VOTE_TARGET_URL", "ftp://vote.example/");
        assert!(matches!(
            Config::from_env(),
            Err(ProxyVoteError::InvalidConfig(_))
        ));

        env::set_var("VOTE_TARGET_URL", "http://vote.example/");
        env::set_var("VOTE_BUILDING_ID", "abc");
        assert!(matches!(
            Config::from_env(),
            Err(ProxyVoteError::InvalidConfig(_))
        ));
        env::remove_var("VOTE_BUILDING_ID");

        env::set_var("VOTE_WINDOW_START", "21");
        env::set_var("VOTE_WINDOW_END", "5");
        assert!(matches!(
            Config::from_env(),
            Err(ProxyVoteError::InvalidConfig(_))
        ));
        env::remove_var("VOTE_WINDOW_START");
        env::remove_var("VOTE_WINDOW_END");

        env::set_var("PROXY_MIN_LEVEL", "distorting");
        assert!(matches!(
            Config::from_env(),
            Err(ProxyVoteError::InvalidConfig(_))
        ));
        env::remove_var("PROXY_MIN_LEVEL");

        env::set_var("VOTE_IDLE_BACKOFF", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ProxyVoteError::InvalidConfig(_))
        ));
        env::remove_var("VOTE_IDLE_BACKOFF");

        env::set_var("VOTE_MAX_FAILURES", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ProxyVoteError::InvalidConfig(_))
        ));
        env::remove_var("VOTE_MAX_FAILURES");

        env::set_var("PROXY_REQUIRE_HTTPS", "maybe");
        assert!(matches!(
            Config::from_env(),
            Err(ProxyVoteError::InvalidConfig(_))
        ));
    }
}
