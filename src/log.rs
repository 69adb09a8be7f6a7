//! Logging utilities used by this crate.

use std::io;

use chrono::Local;
use slog::{
    o, Drain, Duplicate, FnValue, Fuse, Level, Logger, PushFnValue, Record,
};
use slog_async::Async;
use slog_json::Json;

/// Re-exports common definitions for logging.
///
/// Use this module as following:
/// ```rust
/// use conclave::log::prelude::*;
/// ```
pub mod prelude {
    pub use slog::{slog_debug, slog_error, slog_info, slog_trace, slog_warn};
    pub use slog_scope::{debug, error, info, trace, warn};
}

/// Builds a JSON [`Logger`] writing all its log records to `w`.
///
/// Records carry the default `msg`, `fqn`, `time` and `lvl` fields.
pub fn new_logger<W>(w: W) -> Logger
where
    W: io::Write + Send + 'static,
{
    let drain = Json::new(w).build().fuse();
    let drain = Async::new(drain).build().fuse();
    add_default_keys(&Logger::root(drain, o!()))
}

/// Builds a JSON [`Logger`] writing its log records to `w_out`, except for
/// WARN level (and higher) records, which go to `w_err`. Records are
/// filtered by the `RUST_LOG` environment variable and drained
/// asynchronously with a channel of 2048 entries.
///
/// Records carry the default `msg`, `fqn`, `time` and `lvl` fields.
pub fn new_dual_logger<W1, W2>(w_out: W1, w_err: W2) -> Logger
where
    W1: io::Write + Send + 'static,
    W2: io::Write + Send + 'static,
{
    let drain_out = Json::new(w_out).build();
    let drain_err = Json::new(w_err).build();
    let drain = Duplicate(
        drain_out.filter(|r| !r.level().is_at_least(Level::Warning)),
        drain_err.filter_level(Level::Warning),
    )
    .map(Fuse);
    let drain = slog_envlogger::new(drain).fuse();
    let drain = Async::new(drain).chan_size(2048).build().fuse();
    add_default_keys(&Logger::root(drain, o!()))
}

/// Adds default log record data (key-value pairs) to the given [`Logger`]:
/// - `msg`: log record message;
/// - `fqn`: path to the code line that emitted the record;
/// - `time`: record creation time in RFC 3339 format;
/// - `lvl`: logging level of the record.
fn add_default_keys(logger: &Logger) -> Logger {
    logger.new(o!(
        "msg" => PushFnValue(move |record: &Record, ser| {
            ser.emit(record.msg())
        }),
        "fqn" => PushFnValue(move |record: &Record, ser| {
            ser.emit(format_args!("{}:{}", record.module(), record.line()))
        }),
        "time" => PushFnValue(move |_: &Record, ser| {
            ser.emit(Local::now().to_rfc3339())
        }),
        "lvl" => FnValue(move |record: &Record| {
            record.level().as_str()
        }),
    ))
}

#[cfg(test)]
mod log_specs {
    use super::*;

    #[test]
    fn loggers_build_and_accept_records() {
        let logger = new_logger(io::sink());
        slog::info!(logger, "probe"; "kind" => "single");

        let logger = new_dual_logger(io::sink(), io::sink());
        slog::warn!(logger, "probe"; "kind" => "dual");
    }
}
