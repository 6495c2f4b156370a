use crate::server::error::ServerError;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use std::net::{IpAddr, SocketAddr};

/// Runtime configuration for the `enki-server` binary.
///
/// All values are parsed from CLI arguments or environment variables. The
/// environment variable for a flag is its name upper-cased with dashes
/// replaced by underscores (`--grpc-port` ↔ `GRPC_PORT`).
///
/// An empty port disables the corresponding server entirely; it is neither
/// bound nor waited on during shutdown.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "enki-server",
    version,
    about = "A gRPC greeting service with a debug HTTP server and coordinated graceful shutdown"
)]
pub struct CliArgs {
    /// Minimum severity of emitted log events.
    ///
    /// `fatal` and `panic` are accepted for compatibility and behave like
    /// `error`. `RUST_LOG`, when set, takes precedence.
    ///
    /// Environment variable: `LOG_LEVEL`
    #[arg(long, env = "LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Interface both servers bind to.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    pub host: String,

    /// Port on which the gRPC server is exposed. Empty disables it.
    ///
    /// Environment variable: `GRPC_PORT`
    #[arg(long, env = "GRPC_PORT", default_value_t = String::from("50051"))]
    pub grpc_port: String,

    /// Port of the debug HTTP server (health probes and metrics). Empty
    /// disables it.
    ///
    /// Environment variable: `HTTP_DEBUG_PORT`
    #[arg(long, env = "HTTP_DEBUG_PORT", default_value_t = String::from("3000"))]
    pub http_debug_port: String,

    /// Upper bound on the gRPC server's graceful shutdown, e.g. `5s`, `1m30s`.
    ///
    /// Environment variable: `GRPC_GRACE_PERIOD`
    #[arg(long, env = "GRPC_GRACE_PERIOD", default_value = "5s", value_parser = parse_duration)]
    pub grpc_grace_period: Duration,

    /// Upper bound on the HTTP server's graceful shutdown, e.g. `3s`.
    ///
    /// Environment variable: `HTTP_GRACE_PERIOD`
    #[arg(long, env = "HTTP_GRACE_PERIOD", default_value = "3s", value_parser = parse_duration)]
    pub http_grace_period: Duration,
}

/// Log severities accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl LogLevel {
    /// The `EnvFilter` directive this level maps to.
    #[must_use]
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error | Self::Fatal | Self::Panic => "error",
        }
    }
}

/// Configuration of a single protocol server. Immutable once the server is
/// constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind, or `None` when the server is disabled.
    pub addr: Option<SocketAddr>,
    /// Bound on the graceful shutdown before connections are abandoned.
    pub grace_period: Duration,
}

impl ServerConfig {
    /// A server bound to `addr`.
    #[must_use]
    pub const fn enabled(addr: SocketAddr, grace_period: Duration) -> Self {
        Self {
            addr: Some(addr),
            grace_period,
        }
    }

    /// A server that is intentionally switched off.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            addr: None,
            grace_period: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.addr.is_some()
    }
}

/// Validated process configuration handed to every component at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppConfig {
    pub log_level: LogLevel,
    pub grpc: ServerConfig,
    pub http: ServerConfig,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = ServerError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let host: IpAddr = args
            .host
            .trim()
            .parse()
            .map_err(|e| ServerError::Config(format!("HOST {:?} is invalid: {e}", args.host)))?;

        Ok(Self {
            log_level: args.log_level,
            grpc: server_config("GRPC_PORT", host, &args.grpc_port, args.grpc_grace_period)?,
            http: server_config(
                "HTTP_DEBUG_PORT",
                host,
                &args.http_debug_port,
                args.http_grace_period,
            )?,
        })
    }
}

fn server_config(
    key: &str,
    host: IpAddr,
    port: &str,
    grace_period: Duration,
) -> Result<ServerConfig, ServerError> {
    let port = port.trim();
    if port.is_empty() {
        return Ok(ServerConfig::disabled());
    }
    let port: u16 = port
        .parse()
        .map_err(|e| ServerError::Config(format!("{key} {port:?} is not a valid port: {e}")))?;
    Ok(ServerConfig::enabled(
        SocketAddr::new(host, port),
        grace_period,
    ))
}

/// Parses a Go-style duration string such as `300ms`, `5s` or `1h2m3.5s`.
///
/// Accepted units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare
/// `0` is accepted as zero; any other unit-less number is rejected.
///
/// # Errors
///
/// Returns a human-readable message describing the first invalid segment.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration {input:?}"))?;
        if num_end == 0 {
            return Err(format!("expected a number in duration {input:?}"));
        }
        let value: f64 = rest[..num_end]
            .parse()
            .map_err(|_| format!("invalid number in duration {input:?}"))?;
        rest = &rest[num_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            unit => return Err(format!("unknown unit {unit:?} in duration {input:?}")),
        };
        rest = &rest[unit_end..];
        total += value * nanos_per_unit;
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(format!("duration {input:?} is out of range"));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(Duration::from_nanos(total.round() as u64))
}
