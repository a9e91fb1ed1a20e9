//! Unit tests for the Engine logging facade
//!
//! IMPORTANT: LOGGER is a global OnceLock shared across all tests.
//! All tests are marked with #[serial] to run sequentially.

use crate::rosy::{Engine, Error};
use crate::rosy::log::{Logger, LogEntry, LogSeverity};
use crate::{engine_bail, engine_debug, engine_err, engine_error, engine_info, engine_trace};
use std::sync::{Arc, Mutex};
use serial_test::serial;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Test logger that captures log entries for verification
#[derive(Clone)]
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    fn install() -> Self {
        let logger = Self { entries: Arc::new(Mutex::new(Vec::new())) };
        Engine::set_logger(logger.clone());
        Engine::set_min_severity(LogSeverity::Trace);
        logger
    }

    fn take(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn teardown() {
    Engine::set_min_severity(LogSeverity::Trace);
    Engine::reset_logger();
}

// ============================================================================
// LOGGER ROUTING
// ============================================================================

#[test]
#[serial]
fn test_macros_reach_custom_logger() {
    let capture = CaptureLogger::install();

    engine_trace!("rosy::test", "trace {}", 1);
    engine_debug!("rosy::test", "debug {}", 2);
    engine_info!("rosy::test", "info {}", 3);

    let entries = capture.take();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].severity, LogSeverity::Trace);
    assert_eq!(entries[2].message, "info 3");
    assert_eq!(entries[2].source, "rosy::test");
    assert!(entries.iter().all(|e| e.file.is_none()));
    teardown();
}

#[test]
#[serial]
fn test_engine_error_carries_location() {
    let capture = CaptureLogger::install();

    engine_error!("rosy::test", "device lost");

    let entries = capture.take();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, LogSeverity::Error);
    assert!(entries[0].file.unwrap().ends_with("engine_tests.rs"));
    assert!(entries[0].line.is_some());
    teardown();
}

#[test]
#[serial]
fn test_min_severity_filters_entries() {
    let capture = CaptureLogger::install();
    Engine::set_min_severity(LogSeverity::Info);
    assert_eq!(Engine::min_severity(), LogSeverity::Info);

    engine_trace!("rosy::test", "dropped");
    engine_debug!("rosy::test", "dropped");
    engine_info!("rosy::test", "kept");
    engine_error!("rosy::test", "kept");

    let entries = capture.take();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.message == "kept"));
    teardown();
}

#[test]
#[serial]
fn test_reset_logger_detaches_custom_logger() {
    let capture = CaptureLogger::install();
    Engine::reset_logger();

    engine_info!("rosy::test", "goes to the default logger");

    assert!(capture.take().is_empty());
    teardown();
}

// ============================================================================
// ERROR MACROS
// ============================================================================

fn bail_with_state() -> crate::rosy::Result<()> {
    engine_bail!("rosy::test", InvalidState => "render_pass before begin_frame");
}

#[test]
#[serial]
fn test_engine_err_defaults_to_backend_error() {
    let capture = CaptureLogger::install();

    let err = engine_err!("rosy::test", "vkQueueSubmit2 returned {}", -4);

    assert_eq!(err, Error::BackendError("vkQueueSubmit2 returned -4".to_string()));
    let entries = capture.take();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "vkQueueSubmit2 returned -4");
    teardown();
}

#[test]
#[serial]
fn test_engine_err_with_variant() {
    let capture = CaptureLogger::install();

    let err = engine_err!("rosy::test", MalformedAsset => "node {} has no name", 3);

    assert_eq!(err, Error::MalformedAsset("node 3 has no name".to_string()));
    assert_eq!(capture.take().len(), 1);
    teardown();
}

#[test]
#[serial]
fn test_engine_bail_returns_and_logs() {
    let capture = CaptureLogger::install();

    let result = bail_with_state();

    assert!(matches!(result, Err(Error::InvalidState(_))));
    let entries = capture.take();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].severity, LogSeverity::Error);
    teardown();
}
