use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError};

pub(crate) struct Logger;

impl Logger {
    pub(crate) fn text(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let layer = fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_thread_names(true)
            .with_timer(mk_timer());

        init_with(tracing_subscriber::registry().with(mk_filter(&cfg.level)?).with(layer))
    }

    pub(crate) fn json(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_thread_names(true)
            .with_current_span(true)
            .with_timer(mk_timer());

        init_with(tracing_subscriber::registry().with(mk_filter(&cfg.level)?).with(layer))
    }

    pub(crate) fn journald(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        mk_journald(mk_filter(&cfg.level)?)
    }
}

fn mk_filter(directives: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(directives).map_err(|_| LoggerError::InvalidLogLevel(directives.to_string()))
}

/// RFC 3339 timestamps in the local offset, UTC when it cannot be determined.
fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(|e| {
        let msg = e.to_string();
        if msg.contains("SetGlobalDefaultError") || msg.contains("global default") {
            LoggerError::AlreadyInitialized
        } else {
            LoggerError::InitializationFailed(msg)
        }
    })
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn mk_journald(filter: EnvFilter) -> Result<(), LoggerError> {
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("tagvisor".to_string());
    init_with(tracing_subscriber::registry().with(filter).with(journald))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn mk_journald(_filter: EnvFilter) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_rejects_garbage() {
        assert!(mk_filter("info,tagvisor_core=debug").is_ok());
        assert!(matches!(
            mk_filter("tagvisor_core=notalevel"),
            Err(LoggerError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn timer_writes_rfc3339() {
        use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

        let mut out = String::new();
        mk_timer().format_time(&mut Writer::new(&mut out)).unwrap();
        assert!(out.len() >= 20);
        assert_eq!(out.as_bytes()[10], b'T');
    }

    #[test]
    fn second_init_reports_already_initialized() {
        let cfg = LoggerConfig::default().with_level("warn");
        // The first call may lose to another test installing a subscriber.
        let _ = Logger::text(&cfg);
        assert!(matches!(
            Logger::json(&cfg),
            Err(LoggerError::AlreadyInitialized)
        ));
    }
}
