use std::path::PathBuf;

use snafu::{ResultExt, Snafu};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Registry,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

/// Environment variable holding the log filter directives, e.g. `manifestgen=debug`.
pub const LOG_ENV: &str = "MANIFESTGEN_LOG";

/// Environment variable naming a directory which receives a copy of the log output.
pub const LOG_DIRECTORY_ENV: &str = "MANIFESTGEN_LOG_DIRECTORY";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to initialize the rolling file appender in {}", directory.display()))]
    InitializeFileAppender {
        source: InitError,
        directory: PathBuf,
    },

    #[snafu(display("failed to install the tracing subscriber"))]
    InstallSubscriber { source: TryInitError },
}

/// Initializes `tracing` logging with the filter from [`LOG_ENV`].
///
/// If the variable is unset or invalid, the maximum log level is INFO. Log output goes to
/// stderr and, if [`LOG_DIRECTORY_ENV`] is set, is also written as JSON into daily rotated files
/// in that directory.
pub fn initialize_logging() -> Result<(), Error> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(tracing::Level::INFO.to_string()));

    let file_appender_directory = std::env::var_os(LOG_DIRECTORY_ENV).map(PathBuf::from);
    let file_layer = file_appender_directory
        .as_deref()
        .map(|directory| {
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("manifestgen")
                .filename_suffix("log")
                .max_log_files(6)
                .build(directory)
                .context(InitializeFileAppenderSnafu { directory })
        })
        .transpose()?
        .map(|appender| tracing_subscriber::fmt::layer().json().with_writer(appender));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context(InstallSubscriberSnafu)?;

    // need to delay logging until after tracing is initialized
    match file_appender_directory {
        Some(directory) => tracing::info!(directory = %directory.display(), "file logging enabled"),
        None => tracing::debug!("file logging disabled, because no log directory set"),
    }

    Ok(())
}
