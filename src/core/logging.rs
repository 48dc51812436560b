//! Logging setup and per-tick status lines.

use std::fmt;

use tracing_subscriber::EnvFilter;

use crate::core::data::Value;

/// Default filter for a `-v` count: 0 = info, 1 = debug, 2+ = trace.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the verbosity flag when it is set. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// One-line summary of a completed tick.
///
/// Displays as `tick=12 level=43.10 fill=true drain=false anomaly=false`,
/// listing only the tags the station chose to report.
#[derive(Debug, Clone, PartialEq)]
pub struct TickStatus {
    pub tick: u64,
    pub anomaly: bool,
    pub values: Vec<(String, Value)>,
}

impl fmt::Display for TickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick={}", self.tick)?;
        for (name, value) in &self.values {
            write!(f, " {}={}", name, value)?;
        }
        write!(f, " anomaly={}", self.anomaly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(0), "info");
        assert_eq!(default_filter(1), "debug");
        assert_eq!(default_filter(5), "trace");
    }

    #[test]
    fn test_tick_status_display() {
        let status = TickStatus {
            tick: 3,
            anomaly: false,
            values: vec![
                ("tank_level".into(), Value::Float(10.2)),
                ("fill_valve".into(), Value::Bool(true)),
            ],
        };
        assert_eq!(
            status.to_string(),
            "tick=3 tank_level=10.20 fill_valve=true anomaly=false"
        );
    }
}
