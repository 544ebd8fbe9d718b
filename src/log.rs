//! Provides logging utilities, used by the `media-connection` binary and
//! embedders wanting structured JSON logs.
//!
//! Library code logs through the [`log`] facade, which is bridged into the
//! installed [`slog_scope`] global logger.
//!
//! [`log`]: ::log

use std::io;

use chrono::Local;
use slog::{
    o, Drain, Duplicate, FnValue, Fuse, Level, Logger, PushFnValue, Record,
};
use slog_async::Async;
use slog_json::Json;
use slog_scope::GlobalLoggerGuard;

/// Re-exports common definitions for logging.
///
/// Use this module as following:
/// ```rust
/// use media_connection::log::prelude::*;
/// ```
pub mod prelude {
    pub use slog::{slog_debug, slog_error, slog_info, slog_trace, slog_warn};
    pub use slog_scope::{debug, error, info, trace, warn};
}

/// Builds JSON [`Logger`] which prints all its log records to `w_out` writer,
/// but WARN level (and higher) to `w_err` writer. Records are filtered with
/// the `RUST_LOG` environment variable. Logger will use [`Async`] drain with
/// channel size of 2048 entries.
///
/// Created [`Logger`] produces log records with `fqn`, `lvl`, `time` and `msg`
/// fields by default.
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

/// Installs [`new_dual_logger()`] over stdout and stderr as the global
/// logger, and redirects [`log`] records into it.
///
/// Logging stays installed while the returned [`GlobalLoggerGuard`] is
/// alive.
///
/// # Errors
///
/// If some [`log`] logger has been installed already.
///
/// [`log`]: ::log
pub fn init() -> Result<GlobalLoggerGuard, ::log::SetLoggerError> {
    let logger = new_dual_logger(io::stdout(), io::stderr());
    let guard = slog_scope::set_global_logger(logger);
    slog_stdlog::init()?;
    Ok(guard)
}

/// Adds default log record data (key-value pairs) to specified [`Logger`]:
/// - `msg`: log record message.
/// - `fqn`: path to code line that called log function.
/// - `time`: creation date and time of log record in [RFC 3339] format.
/// - `lvl`: logging level of log record.
///
/// [RFC 3339]: https://www.ietf.org/rfc/rfc3339.txt
fn add_default_keys(logger: &Logger) -> Logger {
    logger.new(o!(
        "msg" => PushFnValue(move |record : &Record, ser| {
            ser.emit(record.msg())
        }),
        "fqn" => PushFnValue(move |record : &Record, ser| {
             ser.emit(format_args!("{}:{}", record.module(), record.line()))
        }),
        "time" => PushFnValue(move |_ : &Record, ser| {
            ser.emit(Local::now().to_rfc3339())
        }),
        "lvl" => FnValue(move |rinfo : &Record| {
            rinfo.level().as_str()
        }),
    ))
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use serial_test::serial;
    use slog::{info, warn};

    use super::new_dual_logger;

    /// [`io::Write`] collecting everything into a shared buffer.
    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Buffer {
        fn lines(&self) -> Vec<serde_json::Value> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[serial]
    fn splits_records_at_warn_level() {
        std::env::set_var("RUST_LOG", "info");
        let (out, err) = (Buffer::default(), Buffer::default());
        {
            let logger = new_dual_logger(out.clone(), err.clone());
            info!(logger, "connecting");
            warn!(logger, "disconnected");
        }

        let out = out.lines();
        let err = err.lines();
        assert_eq!(out.len(), 1);
        assert_eq!(err.len(), 1);
        assert_eq!(out[0]["msg"], "connecting");
        assert_eq!(out[0]["lvl"], "INFO");
        assert_eq!(err[0]["msg"], "disconnected");
        assert_eq!(err[0]["lvl"], "WARNING");
        assert!(err[0]["time"].is_string());
        assert!(err[0]["fqn"].as_str().unwrap().contains("log::tests"));
    }
}
