use crate::config::AppConfig;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Install the global subscriber. Keep the guard alive until shutdown or
/// buffered file output is lost.
///
/// `RUST_LOG` replaces the configured filter entirely when set.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let appender = RollingFileAppender::new(
        parse_rotation(&config.rotation),
        &config.log_dir,
        &config.log_file,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    // Transfer logs carry ids as fields, so the module target is noise on the console
    let stdout_layer = config
        .log_stdout
        .then(|| fmt::layer().with_target(false).with_ansi(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer(config.use_json, writer))
        .with(stdout_layer)
        .init();

    guard
}

fn file_layer<S, W>(json: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    }
}

/// Unknown names fall back to a single file that never rotates
fn parse_rotation(name: &str) -> Rotation {
    match name.to_ascii_lowercase().as_str() {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// sqlx logs every statement at info
fn default_directives(level: &str) -> String {
    format!("{level},sqlx=warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rotation() {
        assert_eq!(parse_rotation("hourly"), Rotation::HOURLY);
        assert_eq!(parse_rotation("Daily"), Rotation::DAILY);
        assert_eq!(parse_rotation("minutely"), Rotation::MINUTELY);
        assert_eq!(parse_rotation("never"), Rotation::NEVER);
        assert_eq!(parse_rotation("weekly"), Rotation::NEVER);
    }

    #[test]
    fn test_default_directives_quiet_sqlx() {
        assert_eq!(default_directives("debug"), "debug,sqlx=warn");
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }
}
