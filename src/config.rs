//! Configuration for the payment gateway aggregator server.

use clap::Parser;
use std::net::IpAddr;

/// CLI arguments for the payment gateway server.
///
/// Every field also reads from its environment variable, following the
/// teacher's `CliArgs` layering: flags override env vars, env vars override
/// the hardcoded default.
#[derive(Parser, Debug, Clone)]
#[command(name = "paygate")]
#[command(about = "Payment gateway aggregator HTTP server")]
pub struct CliArgs {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Bind host.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Bind port.
    #[arg(long, env = "PORT", default_value_t = config_defaults::DEFAULT_PORT)]
    pub port: u16,

    /// Prefix prepended to every generated API key.
    #[arg(long, env = "API_KEY_PREFIX", default_value = config_defaults::DEFAULT_API_KEY_PREFIX)]
    pub api_key_prefix: String,

    /// Default idempotency-cache TTL in seconds.
    #[arg(long, env = "IDEMPOTENCY_TTL_SECONDS", default_value_t = paygate_core::idempotency::DEFAULT_TTL_SECONDS)]
    pub idempotency_ttl_seconds: u64,

    /// Max concurrent Postgres connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = config_defaults::DEFAULT_MAX_CONNECTIONS)]
    pub database_max_connections: u32,
}

pub mod config_defaults {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_API_KEY_PREFIX: &str = "mch_live_";
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
}

/// Resolved server configuration, parsed once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub api_key_prefix: String,
    pub idempotency_ttl_seconds: u64,
    pub database_max_connections: u32,
}

impl Config {
    /// Parses CLI arguments (with environment-variable fallback via `clap`'s
    /// `env` feature) into a resolved `Config`.
    pub fn load() -> Self {
        let args = CliArgs::parse();
        Config {
            database_url: args.database_url,
            host: args.host,
            port: args.port,
            api_key_prefix: args.api_key_prefix,
            idempotency_ttl_seconds: args.idempotency_ttl_seconds,
            database_max_connections: args.database_max_connections,
        }
    }
}
