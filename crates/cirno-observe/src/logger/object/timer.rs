use std::fmt;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing_subscriber::fmt::{format::Writer, time::FormatTime};

use crate::logger::object::LoggerTimeZone;

/// RFC3339 timestamps in the configured timezone.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoggerTimer {
    tz: LoggerTimeZone,
}

impl LoggerTimer {
    pub(crate) fn new(tz: LoggerTimeZone) -> Self {
        Self { tz }
    }
}

impl FormatTime for LoggerTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        let now = OffsetDateTime::now_utc().to_offset(self.tz.offset());
        match now.format(&Rfc3339) {
            Ok(ts) => write!(w, "{ts}"),
            Err(_) => write!(w, "<invalid-time>"),
        }
    }
}
