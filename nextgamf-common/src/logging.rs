//! Logging setup and protocol tracing helpers
//!
//! `tracing` with an `EnvFilter`; `RUST_LOG` always wins over the configured level.

use std::fmt;

use tracing_subscriber::EnvFilter;

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Installs the global subscriber. Call once at startup.
///
/// ```
/// use nextgamf_common::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Debug);
/// ```
pub fn init_logging(level: LogLevel) {
    init_logging_with_filter(&level.to_string());
}

/// Installs the global subscriber with a directive string such as
/// `"info,nextgamf_nas=debug"`.
pub fn init_logging_with_filter(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // A second install (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Direction of a message relative to the AMF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Uplink, received from the UE or radio node
    Rx,
    /// Downlink, sent towards the UE or radio node
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => f.write_str("RX"),
            Direction::Tx => f.write_str("TX"),
        }
    }
}

/// Logs a protocol message at debug level and its bytes at trace level.
pub fn log_protocol_message(
    protocol: &str,
    direction: Direction,
    ue_id: u64,
    msg_type: &str,
    data: &[u8],
) {
    tracing::debug!(
        protocol,
        direction = %direction,
        amf_ue_ngap_id = ue_id,
        msg_type,
        len = data.len(),
        "{direction} {protocol} {msg_type}"
    );
    tracing::trace!(protocol, amf_ue_ngap_id = ue_id, hex = %HexDump(data), "{protocol} payload");
}

/// Logs a NAS PDU exchanged with a UE.
pub fn log_nas_message(direction: Direction, ue_id: u64, msg_type: &str, data: &[u8]) {
    log_protocol_message("NAS", direction, ue_id, msg_type, data);
}

/// Lower-case hex rendering for log fields.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
