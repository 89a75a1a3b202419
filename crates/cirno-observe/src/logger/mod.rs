mod config;
mod error;
mod layers;
mod object;

pub use config::LoggerConfig;
pub use error::{LoggerError, LoggerResult};
pub use object::{LoggerFormat, LoggerLevel, LoggerTimeZone, init_local_offset};

/// Install the global tracing subscriber described by `cfg`.
///
/// Can succeed only once per process. With [`LoggerTimeZone::Local`], call
/// [`init_local_offset`] first, before any thread is spawned.
///
/// # Examples
/// ```rust
/// use cirno_observe::{LoggerConfig, init_logger};
///
/// init_logger(&LoggerConfig::default()).unwrap();
/// tracing::info!("logger ready");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    match cfg.format {
        LoggerFormat::Text => layers::install_text(cfg),
        LoggerFormat::Json => layers::install_json(cfg),
        LoggerFormat::Journald => layers::install_journald(cfg),
    }
}
