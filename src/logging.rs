use tracing::Level;
use tracing_subscriber::fmt::time::SystemTime;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Install the global subscriber. `RUST_LOG` overrides `level`.
///
/// Events go to stderr so stdout stays free for results.
pub fn init_logging(level: Level, json_output: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("index_advisor={},warn", level)));

    if json_output {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_timer(SystemTime)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(SystemTime)
            .with_target(true)
            .with_thread_names(false);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }
}

/// Parse a level name as accepted in configuration files.
pub fn parse_level(name: &str) -> Option<Level> {
    name.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("WARN"), Some(Level::WARN));
        assert_eq!(parse_level("chatty"), None);
    }
}
