use std::{env, fmt, fs, net::Ipv4Addr, path};

use netpulse::RemainderPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file {0}: {1}")]
    ReadFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to write config file {0}: {1}")]
    WriteFailed(path::PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    ParseFailed(path::PathBuf, #[source] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available: neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub devices: Devices,
    pub ping: Ping,
    pub http: Http,
    pub retention: Retention,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    /// Number of poll workers the device pool is split across
    pub workers: usize,
    /// Seconds between two cycles of one worker
    pub interval_seconds: f64,
    pub remainder: RemainderPolicy,
    /// Stop a worker after this many failed cycles in a row (unset: never)
    pub max_consecutive_failures: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Devices {
    pub addresses: Vec<String>,
    pub ranges: Vec<Ipv4Range>,
}

/// `prefix.first` ..= `prefix.last`, e.g. `192.168.222.1..=254`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Range {
    pub prefix: String,
    pub first: u8,
    pub last: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ping {
    pub program: String,
    pub timeout_seconds: u32,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Http {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retention {
    /// Drop buckets older than this many minutes (unset: keep everything)
    pub keep_minutes: Option<u32>,
    pub cleanup_interval_seconds: u64,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            workers: 15,
            interval_seconds: 30.0,
            remainder: RemainderPolicy::Drop,
            max_consecutive_failures: None,
        }
    }
}

impl Default for Ping {
    fn default() -> Self {
        Self { program: "ping".into(), timeout_seconds: 1, count: 1 }
    }
}

impl Default for Retention {
    fn default() -> Self {
        Self { keep_minutes: None, cleanup_interval_seconds: 60 }
    }
}

impl Default for Http {
    fn default() -> Self {
        Self { bind: "127.0.0.1".into(), port: 55080 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitor: Monitor::default(),
            devices: Devices {
                addresses: Vec::new(),
                ranges: vec![Ipv4Range { prefix: "192.168.222".into(), first: 1, last: 254 }],
            },
            ping: Ping::default(),
            http: Http::default(),
            retention: Retention::default(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/netpulse/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("netpulse/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };
        let optional = |value: Option<u32>| value.map_or_else(|| "unset".to_string(), |v| v.to_string());

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Workers", &self.monitor.workers)?;
        write_1(f, "Interval (s)", &self.monitor.interval_seconds)?;
        write_1(f, "Remainder", &format!("{:?}", self.monitor.remainder))?;
        write_1(f, "Max Consecutive Failures", &optional(self.monitor.max_consecutive_failures))?;
        write_title_1(f, "Devices")?;
        write_1(f, "Addresses", &self.devices.addresses.len())?;
        for range in &self.devices.ranges {
            write_1(f, "Range", &format!("{}.{}..={}", range.prefix, range.first, range.last))?;
        }
        write_title_1(f, "Ping")?;
        write_1(f, "Program", &self.ping.program)?;
        write_1(f, "Timeout (s)", &self.ping.timeout_seconds)?;
        write_1(f, "Count", &self.ping.count)?;
        write_title_1(f, "HTTP")?;
        write_1(f, "Bind Address", &self.http.bind)?;
        write_1(f, "Port", &self.http.port)?;
        write_title_1(f, "Retention")?;
        write_1(f, "Keep (min)", &optional(self.retention.keep_minutes))?;
        write_1(f, "Cleanup Interval (s)", &self.retention.cleanup_interval_seconds)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/netpulse/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|err| Error::ReadFailed(config_path.clone(), err))?;
            toml::from_str(raw_string.as_str())
                .map_err(|err| Error::ParseFailed(config_path.clone(), err))?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))?;
        }

        fs::write(path, config_str).map_err(|err| Error::WriteFailed(path.to_path_buf(), err))
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.monitor.workers == 0 {
            return Err(Error::Invalid("monitor.workers must be at least 1".into()));
        }
        let interval = self.monitor.interval_seconds;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(Error::Invalid(format!(
                "monitor.interval_seconds must be a positive number, got {interval}"
            )));
        }
        for range in &self.devices.ranges {
            if range.first > range.last {
                return Err(Error::Invalid(format!(
                    "device range {}.{}..={} is empty",
                    range.prefix, range.first, range.last
                )));
            }
            let probe = format!("{}.{}", range.prefix, range.first);
            if probe.parse::<Ipv4Addr>().is_err() {
                return Err(Error::Invalid(format!(
                    "device range prefix '{}' is not the first three octets of an IPv4 address",
                    range.prefix
                )));
            }
        }
        Ok(())
    }
}
