mod format;
pub use format::LoggerFormat;

mod level;
pub use level::LoggerLevel;

mod timer;
pub(crate) use timer::LoggerTimer;

mod timezone;
pub use timezone::{LoggerTimeZone, init_local_offset};
