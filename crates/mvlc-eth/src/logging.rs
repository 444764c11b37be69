use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Prefix shared by the targets of all mvlc-eth crates.
const CRATE_TARGET: &str = "mvlc_eth";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Our crates log at `level`, dependencies never below `warn`.
fn targets(level: LogLevel) -> Targets {
    Targets::new()
        .with_default(level.as_filter().min(LevelFilter::WARN))
        .with_target(CRATE_TARGET, level.as_filter())
}

pub fn init_logging(format: LogFormat, level: LogLevel) {
    let registry = tracing_subscriber::registry().with(targets(level));

    // Per-pipe receive loops run on their own threads.
    match format {
        LogFormat::Text => {
            let _ = registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_ansi(false)
                        .with_target(false)
                        .with_thread_names(true),
                )
                .try_init();
        }
        LogFormat::Json => {
            let _ = registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_thread_names(true),
                )
                .try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_are_capped_at_warn() {
        let filter = targets(LogLevel::Trace);
        assert!(filter.would_enable("mvlc_eth_pipe::transport", &tracing::Level::TRACE));
        assert!(!filter.would_enable("some_dependency", &tracing::Level::INFO));
        assert!(filter.would_enable("some_dependency", &tracing::Level::WARN));
    }

    #[test]
    fn quiet_level_applies_everywhere() {
        let filter = targets(LogLevel::Error);
        assert!(!filter.would_enable("mvlc_eth_pipe::eth", &tracing::Level::INFO));
        assert!(!filter.would_enable("some_dependency", &tracing::Level::WARN));
    }
}
