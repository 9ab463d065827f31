//! Bridges the appservice SDK's `(level, module, args)` log calls into `tracing`.

use fxhash::FxHashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Prepended verbatim to every SDK module name.
pub const SDK_MODULE_PREFIX: &str = "bot-sdk";
/// Homeserver error code for an already registered user; expected on every restart.
pub const SUPPRESSED_ERRCODE: &str = "M_USER_IN_USE";

const SDK_TARGET: &str = "bot_sdk";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Outcome of a single SDK log call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Forwarded,
    Suppressed,
}

/// Argument list of an SDK log call.
///
/// A JSON array contributes its items; any other value becomes a one-element list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogArgs(Vec<Value>);

impl LogArgs {
    #[must_use]
    pub fn normalize(value: Value) -> Self {
        match value {
            Value::Array(items) => Self(items),
            other => Self(vec![other]),
        }
    }

    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.0
    }

    /// True when any string argument contains `needle`.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        self.0.iter().any(|arg| matches!(arg, Value::String(s) if s.contains(needle)))
    }
}

impl fmt::Display for LogArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match arg {
                Value::String(s) => f.write_str(s)?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl From<Value> for LogArgs {
    fn from(value: Value) -> Self {
        Self::normalize(value)
    }
}

impl From<&str> for LogArgs {
    fn from(value: &str) -> Self {
        Self(vec![Value::String(value.to_owned())])
    }
}

impl From<String> for LogArgs {
    fn from(value: String) -> Self {
        Self(vec![Value::String(value)])
    }
}

impl From<Vec<Value>> for LogArgs {
    fn from(items: Vec<Value>) -> Self {
        Self(items)
    }
}

/// Destination for SDK log calls.
pub trait SdkLogSink: Send + Sync + fmt::Debug {
    fn log(&self, level: SdkLevel, module: &str, args: LogArgs) -> Delivery;
}

/// Logger bound to one prefixed SDK module name.
#[derive(Debug)]
pub struct ModuleLogger {
    module: String,
}

impl ModuleLogger {
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn emit(&self, level: SdkLevel, args: &LogArgs) {
        let module = self.module.as_str();
        match level {
            SdkLevel::Trace => trace!(target: SDK_TARGET, module, "{args}"),
            SdkLevel::Debug => debug!(target: SDK_TARGET, module, "{args}"),
            SdkLevel::Info => info!(target: SDK_TARGET, module, "{args}"),
            SdkLevel::Warn => warn!(target: SDK_TARGET, module, "{args}"),
            SdkLevel::Error => error!(target: SDK_TARGET, module, "{args}"),
        }
    }
}

/// Routes SDK log calls to per-module loggers, dropping `M_USER_IN_USE` noise.
///
/// Module loggers are created on first use and cached for the multiplexer's lifetime.
#[derive(Debug, Default)]
pub struct LogMultiplexer {
    loggers: RwLock<FxHashMap<String, Arc<ModuleLogger>>>,
}

impl LogMultiplexer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached logger for `bot-sdk<module>`.
    pub fn logger(&self, module: &str) -> Arc<ModuleLogger> {
        let name = format!("{SDK_MODULE_PREFIX}{module}");
        if let Some(logger) = self.loggers.read().get(&name) {
            return Arc::clone(logger);
        }

        let mut loggers = self.loggers.write();
        let logger = loggers
            .entry(name)
            .or_insert_with_key(|name| Arc::new(ModuleLogger { module: name.clone() }));
        Arc::clone(logger)
    }

    pub fn log(&self, level: SdkLevel, module: &str, args: impl Into<LogArgs>) -> Delivery {
        let args = args.into();
        if args.mentions(SUPPRESSED_ERRCODE) {
            return Delivery::Suppressed;
        }

        self.logger(module).emit(level, &args);
        Delivery::Forwarded
    }

    /// Number of distinct modules seen so far.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.loggers.read().len()
    }
}

impl SdkLogSink for LogMultiplexer {
    fn log(&self, level: SdkLevel, module: &str, args: LogArgs) -> Delivery {
        Self::log(self, level, module, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use parking_lot::Mutex;
    use std::io;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).expect("utf8")
        }
    }

    fn captured<F: FnOnce()>(f: F) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::TRACE)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        capture.text()
    }

    #[test]
    fn non_array_arguments_are_wrapped() {
        assert_eq!(LogArgs::normalize(json!("one")).items(), &[json!("one")]);
        assert_eq!(LogArgs::normalize(json!({"a": 1})).items(), &[json!({"a": 1})]);
        assert_eq!(LogArgs::normalize(json!(["a", 2])).items(), &[json!("a"), json!(2)]);
    }

    #[test]
    fn user_in_use_is_suppressed() {
        let mux = LogMultiplexer::new();
        let output = captured(|| {
            let delivery = mux.log(
                SdkLevel::Error,
                "Appservice",
                json!(["Failed to register", "M_USER_IN_USE: User ID already taken"]),
            );
            assert_eq!(delivery, Delivery::Suppressed);
        });

        assert!(output.is_empty(), "unexpected output: {output}");
        assert_eq!(mux.module_count(), 0);
    }

    #[test]
    fn errcode_inside_objects_is_not_scanned() {
        let mux = LogMultiplexer::new();
        let delivery = captured_delivery(&mux, json!({"errcode": "M_USER_IN_USE"}));
        assert_eq!(delivery, Delivery::Forwarded);
    }

    fn captured_delivery(mux: &LogMultiplexer, args: Value) -> Delivery {
        let mut delivery = Delivery::Suppressed;
        captured(|| delivery = mux.log(SdkLevel::Debug, "Http", args));
        delivery
    }

    #[test]
    fn forwarded_calls_carry_prefixed_module() {
        let mux = LogMultiplexer::new();
        let output = captured(|| {
            assert_eq!(mux.log(SdkLevel::Info, "Appservice", "Listening"), Delivery::Forwarded);
        });

        assert!(output.contains("bot-sdkAppservice"), "{output}");
        assert!(output.contains("Listening"), "{output}");
        assert!(output.contains("INFO"), "{output}");
    }

    #[test]
    fn module_loggers_are_cached() {
        let mux = LogMultiplexer::new();
        let first = mux.logger("Intent");
        let second = mux.logger("Intent");
        mux.logger("Appservice");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.module(), "bot-sdkIntent");
        assert_eq!(mux.module_count(), 2);
    }

    #[test]
    fn args_render_space_separated() {
        let args = LogArgs::normalize(json!(["GET", "/rooms", 404]));
        assert_eq!(args.to_string(), "GET /rooms 404");
    }
}
