//! Configuration for the exchange engine binary
//!
//! Sources, weakest first: built-in defaults, an optional JSON config file,
//! environment variables, command-line flags.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_POOL_SIZE: usize = 8;
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENVIRONMENT: &str = "development";

/// Multi-symbol limit-order-book matching engine
#[derive(Debug, Parser)]
#[command(name = "exchange_engine")]
#[command(about = "Multi-symbol limit-order-book matching engine")]
#[command(version)]
pub struct Cli {
    /// Path to a JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Deployment environment name
    #[arg(long, env = "RACK_ENV")]
    pub env: Option<String>,

    /// Log level filter (error, warn, info, debug, trace)
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Redis connection URL
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Connection pool size
    #[arg(long, env = "REDIS_POOL_SIZE")]
    pub redis_pool_size: Option<usize>,

    /// Comma-separated list of trading pairs to serve
    #[arg(long, env = "TRADING_PAIRS", value_delimiter = ',')]
    pub trading_pairs: Option<Vec<String>>,

    /// HTTP listen address
    #[arg(long, env = "HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,
}

/// Optional config-file shape; every field falls back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub redis_url: Option<String>,
    pub redis_pool_size: Option<usize>,
    pub trading_pairs: Option<Vec<String>>,
    pub http_addr: Option<SocketAddr>,
    pub log_level: Option<String>,
    pub env: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub redis_pool_size: usize,
    pub trading_pairs: Vec<String>,
    pub http_addr: SocketAddr,
    pub log_level: String,
    pub env: String,
}

impl Config {
    /// Resolve configuration from the CLI (flags and env) over an optional
    /// config file over defaults.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str::<FileConfig>(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let http_addr = cli
            .http_addr
            .or(file.http_addr)
            .unwrap_or_else(|| {
                DEFAULT_HTTP_ADDR
                    .parse()
                    .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080)))
            });

        let trading_pairs = cli
            .trading_pairs
            .clone()
            .or(file.trading_pairs)
            .or_else(|| {
                // Single-pair deployments set TRADING_PAIR.
                std::env::var("TRADING_PAIR").ok().map(|pair| vec![pair])
            })
            .unwrap_or_default();

        Ok(Self {
            redis_url: cli
                .redis_url
                .clone()
                .or(file.redis_url)
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            redis_pool_size: cli
                .redis_pool_size
                .or(file.redis_pool_size)
                .unwrap_or(DEFAULT_POOL_SIZE),
            trading_pairs,
            http_addr,
            log_level: cli
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            env: cli
                .env
                .clone()
                .or(file.env)
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keep ambient variables from leaking into assertions.
    fn clear_env() {
        for var in [
            "RACK_ENV",
            "LOG_LEVEL",
            "REDIS_URL",
            "REDIS_POOL_SIZE",
            "TRADING_PAIR",
            "TRADING_PAIRS",
            "HTTP_ADDR",
        ] {
            std::env::remove_var(var);
        }
    }

    fn bare_cli() -> Cli {
        clear_env();
        Cli::parse_from(["exchange_engine"])
    }

    #[test]
    fn test_defaults() {
        let config = Config::load(&bare_cli()).unwrap();
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert_eq!(config.redis_pool_size, DEFAULT_POOL_SIZE);
        assert!(config.trading_pairs.is_empty());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_flags_override_defaults() {
        clear_env();
        let cli = Cli::parse_from([
            "exchange_engine",
            "--redis-url",
            "redis://cache:6379",
            "--redis-pool-size",
            "16",
            "--trading-pairs",
            "BTCUSDT,ETHUSDT",
            "--log-level",
            "debug",
        ]);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.redis_url, "redis://cache:6379");
        assert_eq!(config.redis_pool_size, 16);
        assert_eq!(config.trading_pairs, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_file_config_fills_gaps() {
        let dir = std::env::temp_dir();
        let path = dir.join("exchange_engine_test_config.json");
        fs::write(
            &path,
            r#"{"redis_pool_size": 4, "trading_pairs": ["BTCUSDT"]}"#,
        )
        .unwrap();

        clear_env();
        let cli = Cli::parse_from([
            "exchange_engine",
            "--config",
            path.to_str().unwrap(),
        ]);
        let config = Config::load(&cli).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.redis_pool_size, 4);
        assert_eq!(config.trading_pairs, vec!["BTCUSDT"]);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
    }

    #[test]
    fn test_missing_config_file_fails() {
        let cli = Cli::parse_from([
            "exchange_engine",
            "--config",
            "/nonexistent/engine.json",
        ]);
        assert!(Config::load(&cli).is_err());
    }
}
