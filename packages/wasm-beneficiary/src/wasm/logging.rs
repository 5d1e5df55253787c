//! `log` backend over the browser console

use log::{Level, LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;
use web_sys::console;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let timestamp = js_sys::Date::new_0()
            .to_iso_string()
            .as_string()
            .unwrap_or_default();
        let line = JsValue::from_str(&format!(
            "[{}] [{}] {}: {}",
            timestamp,
            record.level(),
            record.target(),
            record.args()
        ));
        match record.level() {
            Level::Error => console::error_1(&line),
            Level::Warn => console::warn_1(&line),
            Level::Info => console::info_1(&line),
            Level::Debug | Level::Trace => console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

fn parse_level(level: Option<String>) -> Result<LevelFilter, JsValue> {
    match level {
        Some(s) => s
            .parse::<LevelFilter>()
            .map_err(|_| JsValue::from_str(&format!("Invalid log level: {}", s))),
        None => Ok(LevelFilter::Info),
    }
}

/// Route crate logs to the console
///
/// # Arguments
/// * `level` - `off`, `error`, `warn`, `info` (default), `debug` or `trace`
///
/// Later calls only change the level.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging(level: Option<String>) -> Result<(), JsValue> {
    let filter = parse_level(level)?;
    // already installed by an earlier call
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(filter);
    Ok(())
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_init_twice_updates_level() {
        init_logging(Some("debug".into())).unwrap();
        assert_eq!(log::max_level(), LevelFilter::Debug);
        init_logging(Some("warn".into())).unwrap();
        assert_eq!(log::max_level(), LevelFilter::Warn);
        assert!(init_logging(Some("loud".into())).is_err());
    }
}
