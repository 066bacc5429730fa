//! Sampler configuration.

use std::path::PathBuf;

use clap::ValueEnum;

pub const DEFAULT_IP: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5556;
pub const DEFAULT_TOPICS: &str = "LB_STATUS";
pub const DEFAULT_SAMPLE_SIZE: usize = 30;
pub const DEFAULT_OUTPUT_DIR: &str = "files";

/// Which pub/sub client carries the frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportKind {
    /// ZeroMQ SUB socket (`tcp://ip:port`)
    #[default]
    Zmq,
    /// NATS core subscription (`nats://ip:port`)
    Nats,
}

/// What the run does with decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Collect a target number of distinct samples, then write one report
    #[default]
    Sample,
    /// Append every decoded frame to the report until interrupted
    Stream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub ip: String,
    pub port: u16,
    pub topics: Vec<String>,
    /// Number of distinct message ids to collect in [`Mode::Sample`].
    pub target: usize,
    pub output_dir: PathBuf,
    pub transport: TransportKind,
    pub mode: Mode,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_string(),
            port: DEFAULT_PORT,
            topics: parse_topics(DEFAULT_TOPICS),
            target: DEFAULT_SAMPLE_SIZE,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            transport: TransportKind::default(),
            mode: Mode::default(),
        }
    }
}

impl SamplerConfig {
    /// Address handed to the transport's `connect`.
    pub fn address(&self) -> String {
        let scheme = match self.transport {
            TransportKind::Zmq => "tcp",
            TransportKind::Nats => "nats",
        };
        format!("{}://{}:{}", scheme, self.ip, self.port)
    }
}

/// Split a comma-separated topic list, dropping blank entries.
pub fn parse_topics(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SamplerConfig::default();

        assert_eq!(config.address(), "tcp://localhost:5556");
        assert_eq!(config.topics, vec!["LB_STATUS".to_string()]);
        assert_eq!(config.target, 30);
        assert_eq!(config.output_dir, PathBuf::from("files"));
        assert_eq!(config.mode, Mode::Sample);
    }

    #[test]
    fn test_nats_address() {
        let config = SamplerConfig {
            ip: "10.0.0.5".to_string(),
            port: 4222,
            transport: TransportKind::Nats,
            ..Default::default()
        };
        assert_eq!(config.address(), "nats://10.0.0.5:4222");
    }

    #[test]
    fn test_parse_topics() {
        assert_eq!(parse_topics("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_topics("").is_empty());
        assert!(parse_topics(" , ").is_empty());
    }
}
