//! Startup Configuration
//!
//! The reducer is configured entirely from process arguments:
//!
//! ```text
//! catalog-reducer [--port <port>] [--bind <ip>] [--request-timeout-ms <ms>]
//!                 [--connect-timeout-ms <ms>] [--stats-interval-secs <s>]
//!                 [--log-level <level>] <host:port> [<host:port> ...]
//! ```
//!
//! Replica order on the command line is the tie-break order for every
//! first-seen reduction. `REDUCER_PORT` replaces the default port when no
//! `--port` is given.

use crate::replica::types::{ReplicaAddr, ReplicaOptions};

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8090;
pub const PORT_ENV: &str = "REDUCER_PORT";
const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartupError {
    #[error("no valid replica addresses given")]
    NoReplicas,

    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("invalid value '{value}' for {flag}")]
    InvalidValue { flag: String, value: String },

    #[error("unknown option {0}")]
    UnknownOption(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReducerConfig {
    pub bind_ip: IpAddr,
    pub port: u16,
    /// In configured order.
    pub replicas: Vec<ReplicaAddr>,
    pub replica_options: ReplicaOptions,
    /// `None` disables the stats reporter.
    pub stats_interval: Option<Duration>,
    pub log_level: tracing::Level,
    /// Arguments that looked like replicas but did not parse, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Set when `REDUCER_PORT` held something that is not a port.
    pub ignored_env_port: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedArgs {
    Run(ReducerConfig),
    Help,
}

impl ReducerConfig {
    /// Parses arguments (without the program name). `env_port` is the value of
    /// `REDUCER_PORT`, if set.
    pub fn from_args<I>(args: I, env_port: Option<String>) -> Result<ParsedArgs, StartupError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut bind_ip = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let mut port: Option<u16> = None;
        let mut replica_options = ReplicaOptions::default();
        let mut stats_interval = Some(DEFAULT_STATS_INTERVAL);
        let mut log_level = tracing::Level::INFO;
        let mut replicas = Vec::new();
        let mut skipped = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => return Ok(ParsedArgs::Help),
                "--port" => {
                    let value = flag_value(&mut args, &arg)?;
                    port = Some(parse_value::<u16>(&arg, &value)?);
                }
                "--bind" => {
                    let value = flag_value(&mut args, &arg)?;
                    bind_ip = parse_value(&arg, &value)?;
                }
                "--request-timeout-ms" => {
                    let value = flag_value(&mut args, &arg)?;
                    replica_options.request_timeout = parse_millis(&arg, &value)?;
                }
                "--connect-timeout-ms" => {
                    let value = flag_value(&mut args, &arg)?;
                    replica_options.connect_timeout = parse_millis(&arg, &value)?;
                }
                "--stats-interval-secs" => {
                    let value = flag_value(&mut args, &arg)?;
                    let secs = parse_value::<u64>(&arg, &value)?;
                    stats_interval = (secs > 0).then(|| Duration::from_secs(secs));
                }
                "--log-level" => {
                    let value = flag_value(&mut args, &arg)?;
                    log_level = parse_value(&arg, &value)?;
                }
                other if other.starts_with("--") => {
                    return Err(StartupError::UnknownOption(other.to_string()));
                }
                other => match other.parse::<ReplicaAddr>() {
                    Ok(addr) => replicas.push(addr),
                    Err(reason) => skipped.push((other.to_string(), reason)),
                },
            }
        }

        if replicas.is_empty() {
            return Err(StartupError::NoReplicas);
        }

        let mut ignored_env_port = None;
        let port = match port {
            Some(port) => port,
            None => match env_port {
                Some(raw) => match raw.trim().parse::<u16>() {
                    Ok(port) => port,
                    Err(_) => {
                        ignored_env_port = Some(raw);
                        DEFAULT_PORT
                    }
                },
                None => DEFAULT_PORT,
            },
        };

        Ok(ParsedArgs::Run(Self {
            bind_ip,
            port,
            replicas,
            replica_options,
            stats_interval,
            log_level,
            skipped,
            ignored_env_port,
        }))
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }
}

fn flag_value<I>(args: &mut I, flag: &str) -> Result<String, StartupError>
where
    I: Iterator<Item = String>,
{
    args.next()
        .ok_or_else(|| StartupError::MissingValue(flag.to_string()))
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, StartupError> {
    value.parse::<T>().map_err(|_| StartupError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

fn parse_millis(flag: &str, value: &str) -> Result<Duration, StartupError> {
    let millis = parse_value::<u64>(flag, value)?;
    if millis == 0 {
        return Err(StartupError::InvalidValue {
            flag: flag.to_string(),
            value: value.to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [options] <host:port> [<host:port> ...]\n\
         Options:\n\
         \x20 --port <port>               Listening port (default: {DEFAULT_PORT}, env {PORT_ENV})\n\
         \x20 --bind <ip>                 Listening interface (default: 0.0.0.0)\n\
         \x20 --request-timeout-ms <ms>   Per-request replica deadline (default: 5000)\n\
         \x20 --connect-timeout-ms <ms>   Replica connect deadline (default: 2000)\n\
         \x20 --stats-interval-secs <s>   Stats log period, 0 disables (default: 30)\n\
         \x20 --log-level <level>         error|warn|info|debug|trace (default: info)\n\
         Example: {program} --port 8090 127.0.0.1:8081 127.0.0.1:8082"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn run_config(list: &[&str], env_port: Option<&str>) -> ReducerConfig {
        match ReducerConfig::from_args(args(list), env_port.map(str::to_string)).unwrap() {
            ParsedArgs::Run(config) => config,
            ParsedArgs::Help => panic!("expected a run configuration"),
        }
    }

    #[test]
    fn test_defaults_with_replicas() {
        let config = run_config(&["127.0.0.1:8081", "127.0.0.1:8082"], None);

        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.replicas.len(), 2);
        assert_eq!(config.replicas[0].port, 8081);
        assert_eq!(config.replicas[1].port, 8082);
        assert_eq!(config.replica_options, ReplicaOptions::default());
        assert_eq!(config.stats_interval, Some(DEFAULT_STATS_INTERVAL));
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert_eq!(config.listen_addr().port(), DEFAULT_PORT);
    }

    #[test]
    fn test_no_replicas_is_a_startup_error() {
        let result = ReducerConfig::from_args(args(&["--port", "9000"]), None);
        assert_eq!(result, Err(StartupError::NoReplicas));
    }

    #[test]
    fn test_only_invalid_replicas_is_a_startup_error() {
        let result = ReducerConfig::from_args(args(&["nohost", "host:abc"]), None);
        assert_eq!(result, Err(StartupError::NoReplicas));
    }

    #[test]
    fn test_invalid_replicas_are_skipped() {
        let config = run_config(&["bogus", "10.0.0.1:7000"], None);

        assert_eq!(config.replicas, vec![ReplicaAddr::new("10.0.0.1", 7000)]);
        assert_eq!(config.skipped.len(), 1);
        assert_eq!(config.skipped[0].0, "bogus");
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = run_config(
            &[
                "--port",
                "9100",
                "--bind",
                "127.0.0.1",
                "--request-timeout-ms",
                "250",
                "--connect-timeout-ms",
                "100",
                "--stats-interval-secs",
                "0",
                "--log-level",
                "debug",
                "worker:8081",
            ],
            Some("9999"),
        );

        assert_eq!(config.listen_addr(), "127.0.0.1:9100".parse().unwrap());
        assert_eq!(config.replica_options.request_timeout, Duration::from_millis(250));
        assert_eq!(config.replica_options.connect_timeout, Duration::from_millis(100));
        assert_eq!(config.stats_interval, None);
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn test_env_port_used_without_flag() {
        let config = run_config(&["worker:8081"], Some("9300"));
        assert_eq!(config.port, 9300);
        assert_eq!(config.ignored_env_port, None);

        let config = run_config(&["worker:8081"], Some("not-a-port"));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.ignored_env_port.as_deref(), Some("not-a-port"));
    }

    #[test]
    fn test_bad_flags() {
        assert_eq!(
            ReducerConfig::from_args(args(&["worker:8081", "--port"]), None),
            Err(StartupError::MissingValue("--port".to_string()))
        );
        assert!(matches!(
            ReducerConfig::from_args(args(&["--port", "x", "worker:8081"]), None),
            Err(StartupError::InvalidValue { .. })
        ));
        assert!(matches!(
            ReducerConfig::from_args(args(&["--request-timeout-ms", "0", "worker:8081"]), None),
            Err(StartupError::InvalidValue { .. })
        ));
        assert_eq!(
            ReducerConfig::from_args(args(&["--frobnicate", "worker:8081"]), None),
            Err(StartupError::UnknownOption("--frobnicate".to_string()))
        );
    }

    #[test]
    fn test_help() {
        assert_eq!(
            ReducerConfig::from_args(args(&["-h"]), None),
            Ok(ParsedArgs::Help)
        );
        assert!(usage("catalog-reducer").contains("--request-timeout-ms"));
    }
}
