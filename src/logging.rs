//! Logging configuration for the C bindings.

use std::os::raw::{c_char, c_void};
use std::ptr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Once, RwLock};

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;

use crate::error::{clear_error, cstring_from_str_lossy, hashring_error_t, write_error};
use crate::ffi::read_optional_cstr;

const LOGGER_STATE_UNINIT: u8 = 0;
const LOGGER_STATE_READY: u8 = 1;
const LOGGER_STATE_FAILED: u8 = 2;

static LOGGER_STATE: AtomicU8 = AtomicU8::new(LOGGER_STATE_UNINIT);
static LOGGER_INIT: Once = Once::new();
static HASHRING_LOGGER: Lazy<RingLogger> = Lazy::new(RingLogger::new);

/// Log level values for hashring logging.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum hashring_log_level_t {
    HASHRING_LOG_LEVEL_OFF = 0,
    HASHRING_LOG_LEVEL_ERROR = 1,
    HASHRING_LOG_LEVEL_WARN = 2,
    HASHRING_LOG_LEVEL_INFO = 3,
    HASHRING_LOG_LEVEL_DEBUG = 4,
    HASHRING_LOG_LEVEL_TRACE = 5,
}

impl From<hashring_log_level_t> for LevelFilter {
    fn from(value: hashring_log_level_t) -> Self {
        match value {
            hashring_log_level_t::HASHRING_LOG_LEVEL_OFF => LevelFilter::Off,
            hashring_log_level_t::HASHRING_LOG_LEVEL_ERROR => LevelFilter::Error,
            hashring_log_level_t::HASHRING_LOG_LEVEL_WARN => LevelFilter::Warn,
            hashring_log_level_t::HASHRING_LOG_LEVEL_INFO => LevelFilter::Info,
            hashring_log_level_t::HASHRING_LOG_LEVEL_DEBUG => LevelFilter::Debug,
            hashring_log_level_t::HASHRING_LOG_LEVEL_TRACE => LevelFilter::Trace,
        }
    }
}

impl From<Level> for hashring_log_level_t {
    fn from(value: Level) -> Self {
        match value {
            Level::Error => hashring_log_level_t::HASHRING_LOG_LEVEL_ERROR,
            Level::Warn => hashring_log_level_t::HASHRING_LOG_LEVEL_WARN,
            Level::Info => hashring_log_level_t::HASHRING_LOG_LEVEL_INFO,
            Level::Debug => hashring_log_level_t::HASHRING_LOG_LEVEL_DEBUG,
            Level::Trace => hashring_log_level_t::HASHRING_LOG_LEVEL_TRACE,
        }
    }
}

/// Log record delivered to a C callback.
///
/// String pointers are only valid for the duration of the callback.
/// `module_path` and `file` may be null. `line` is 0 when unknown.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct hashring_log_record_t {
    pub level: hashring_log_level_t,
    pub target: *const c_char,
    pub message: *const c_char,
    pub module_path: *const c_char,
    pub file: *const c_char,
    pub line: u32,
}

/// Callback invoked for each enabled log record, from whichever thread
/// emitted it.
#[allow(non_camel_case_types)]
pub type hashring_log_callback_t =
    Option<extern "C" fn(record: *const hashring_log_record_t, user_data: *mut c_void)>;

/// Configuration for `hashring_log_init`.
///
/// A non-null `filter` is parsed as a `RUST_LOG` style directive list and
/// wins over everything else. Otherwise `RUST_LOG` from the environment is
/// used if set, and `level` applied to the `hashring` target if not. Records
/// go to `callback` with `user_data`, or to stderr when `callback` is null.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct hashring_log_config_t {
    pub level: hashring_log_level_t,
    pub filter: *const c_char,
    pub callback: hashring_log_callback_t,
    pub user_data: *mut c_void,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Directive {
    target: String,
    level: LevelFilter,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogFilter {
    default: LevelFilter,
    directives: Vec<Directive>,
}

impl LogFilter {
    fn for_level(level: LevelFilter) -> Self {
        Self {
            default: LevelFilter::Off,
            directives: vec![Directive {
                target: env!("CARGO_CRATE_NAME").to_string(),
                level,
            }],
        }
    }

    /// The most specific directive matching the target decides.
    fn level_for(&self, target: &str) -> LevelFilter {
        self.directives
            .iter()
            .filter(|directive| target.starts_with(&directive.target))
            .max_by_key(|directive| directive.target.len())
            .map_or(self.default, |directive| directive.level)
    }

    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level().to_level_filter() <= self.level_for(metadata.target())
    }

    fn max_level(&self) -> LevelFilter {
        self.directives
            .iter()
            .map(|directive| directive.level)
            .fold(self.default, std::cmp::max)
    }
}

impl FromStr for LogFilter {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut filter = LogFilter {
            default: LevelFilter::Off,
            directives: Vec::new(),
        };

        for (index, directive) in spec.split(',').map(str::trim).enumerate() {
            if directive.is_empty() {
                continue;
            }
            match directive.split_once('=') {
                Some((target, level)) => {
                    let target = target.trim();
                    let level = level.trim();
                    if target.is_empty() {
                        return Err(format!("empty log directive at position {index}"));
                    }
                    if level.is_empty() {
                        return Err(format!("missing log level for target `{target}`"));
                    }
                    let level = parse_level(level).ok_or_else(|| format!("invalid level `{level}`"))?;
                    filter.directives.push(Directive {
                        target: target.to_string(),
                        level,
                    });
                }
                None => match parse_level(directive) {
                    Some(level) => filter.default = level,
                    None => filter.directives.push(Directive {
                        target: directive.to_string(),
                        level: LevelFilter::Trace,
                    }),
                },
            }
        }

        Ok(filter)
    }
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

struct LoggerConfig {
    filter: LogFilter,
    callback: hashring_log_callback_t,
    user_data: usize,
}

struct RingLogger {
    config: RwLock<LoggerConfig>,
}

impl RingLogger {
    fn new() -> Self {
        Self {
            config: RwLock::new(LoggerConfig {
                filter: LogFilter::for_level(LevelFilter::Info),
                callback: None,
                user_data: 0,
            }),
        }
    }

    fn update(&self, config: LoggerConfig) {
        let mut guard = self.config.write().unwrap_or_else(|err| err.into_inner());
        *guard = config;
    }

    fn with_config<T>(&self, f: impl FnOnce(&LoggerConfig) -> T) -> T {
        let guard = self.config.read().unwrap_or_else(|err| err.into_inner());
        f(&guard)
    }
}

impl Log for RingLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.with_config(|config| config.filter.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        let (callback, user_data, enabled) = self.with_config(|config| {
            (
                config.callback,
                config.user_data,
                config.filter.enabled(record.metadata()),
            )
        });
        if !enabled {
            return;
        }

        let Some(callback) = callback else {
            eprintln!("{} {}: {}", record.level(), record.target(), record.args());
            return;
        };

        let target = cstring_from_str_lossy(record.target());
        let message = cstring_from_str_lossy(&record.args().to_string());
        let module_path = record.module_path().map(cstring_from_str_lossy);
        let file = record.file().map(cstring_from_str_lossy);
        let c_record = hashring_log_record_t {
            level: record.level().into(),
            target: target.as_ptr(),
            message: message.as_ptr(),
            module_path: module_path.as_ref().map_or(ptr::null(), |value| value.as_ptr()),
            file: file.as_ref().map_or(ptr::null(), |value| value.as_ptr()),
            line: record.line().unwrap_or(0),
        };
        callback(&c_record, user_data as *mut c_void);
    }

    fn flush(&self) {}
}

fn resolve_filter(config: Option<&hashring_log_config_t>) -> Result<LogFilter, String> {
    if let Some(filter) = config.and_then(|config| read_optional_cstr(config.filter)) {
        return filter
            .parse()
            .map_err(|err| format!("invalid log filter `{filter}`: {err}"));
    }

    if let Ok(filter) = std::env::var("RUST_LOG") {
        return filter
            .parse()
            .map_err(|err| format!("invalid RUST_LOG value `{filter}`: {err}"));
    }

    let level = config.map_or(hashring_log_level_t::HASHRING_LOG_LEVEL_INFO, |config| {
        config.level
    });
    Ok(LogFilter::for_level(level.into()))
}

fn ensure_logger(out_error: *mut *mut hashring_error_t) -> bool {
    LOGGER_INIT.call_once(|| {
        let state = if log::set_logger(&*HASHRING_LOGGER).is_ok() {
            LOGGER_STATE_READY
        } else {
            LOGGER_STATE_FAILED
        };
        LOGGER_STATE.store(state, Ordering::SeqCst);
    });

    match LOGGER_STATE.load(Ordering::SeqCst) {
        LOGGER_STATE_READY => true,
        LOGGER_STATE_FAILED => {
            write_error(out_error, "logging already initialized by another logger");
            false
        }
        _ => {
            write_error(out_error, "logging failed to initialize");
            false
        }
    }
}

/// Fills `config` with defaults: INFO for the `hashring` target, no filter
/// and no callback.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_log_config_init(config: *mut hashring_log_config_t) {
    if config.is_null() {
        return;
    }
    // Safety: caller provided a writable config pointer.
    unsafe {
        *config = hashring_log_config_t {
            level: hashring_log_level_t::HASHRING_LOG_LEVEL_INFO,
            filter: ptr::null(),
            callback: None,
            user_data: ptr::null_mut(),
        };
    }
}

/// Installs the hashring logger, or reconfigures it if already installed.
///
/// A null `config` selects the defaults.
#[unsafe(no_mangle)]
pub extern "C" fn hashring_log_init(
    config: *const hashring_log_config_t,
    out_error: *mut *mut hashring_error_t,
) -> bool {
    clear_error(out_error);

    // Safety: a non-null config must point to a valid hashring_log_config_t.
    let config = unsafe { config.as_ref() };
    let filter = match resolve_filter(config) {
        Ok(filter) => filter,
        Err(message) => {
            write_error(out_error, message);
            return false;
        }
    };

    if !ensure_logger(out_error) {
        return false;
    }

    let max_level = filter.max_level();
    HASHRING_LOGGER.update(LoggerConfig {
        filter,
        callback: config.and_then(|config| config.callback),
        user_data: config.map_or(0, |config| config.user_data as usize),
    });
    log::set_max_level(max_level);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directives() {
        let filter: LogFilter = "warn,hashring=debug,hashring::ring=trace".parse().unwrap();
        assert_eq!(filter.default, LevelFilter::Warn);
        assert_eq!(filter.level_for("hashring::cache"), LevelFilter::Debug);
        assert_eq!(filter.level_for("hashring::ring"), LevelFilter::Trace);
        assert_eq!(filter.level_for("other"), LevelFilter::Warn);
        assert_eq!(filter.max_level(), LevelFilter::Trace);
    }

    #[test]
    fn max_level_covers_default_and_directives() {
        let filter: LogFilter = "debug,hashring=warn".parse().unwrap();
        assert_eq!(filter.max_level(), LevelFilter::Debug);
        let filter: LogFilter = "off,hashring::cache=info".parse().unwrap();
        assert_eq!(filter.max_level(), LevelFilter::Info);
    }

    #[test]
    fn bare_target_enables_everything() {
        let filter: LogFilter = "hashring".parse().unwrap();
        assert_eq!(filter.level_for("hashring::ring"), LevelFilter::Trace);
        assert_eq!(filter.level_for("std"), LevelFilter::Off);
    }

    #[test]
    fn rejects_bad_directives() {
        assert!("=debug".parse::<LogFilter>().is_err());
        assert!("hashring=".parse::<LogFilter>().is_err());
        assert!("hashring=loud".parse::<LogFilter>().is_err());
    }

    #[test]
    fn default_filter_targets_crate() {
        let filter = LogFilter::for_level(LevelFilter::Debug);
        assert_eq!(filter.level_for("hashring::ring"), LevelFilter::Debug);
        assert_eq!(filter.level_for("md5"), LevelFilter::Off);
    }

    #[test]
    fn explicit_filter_wins() {
        let filter = std::ffi::CString::new("error").unwrap();
        let config = hashring_log_config_t {
            level: hashring_log_level_t::HASHRING_LOG_LEVEL_TRACE,
            filter: filter.as_ptr(),
            callback: None,
            user_data: ptr::null_mut(),
        };
        let resolved = resolve_filter(Some(&config)).unwrap();
        assert_eq!(resolved.default, LevelFilter::Error);
        assert!(resolved.directives.is_empty());
    }
}
