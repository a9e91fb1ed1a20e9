//! Unit tests for error.rs
//!
//! Tests Display output, recoverability classification and `?` propagation.

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit2 failed".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("vkQueueSubmit2 failed"));
}

#[test]
fn test_out_of_memory_display() {
    assert_eq!(format!("{}", Error::OutOfMemory), "Out of GPU memory");
}

#[test]
fn test_malformed_asset_display() {
    let err = Error::MalformedAsset("node 4 has child 99".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Malformed asset"));
    assert!(display.contains("child 99"));
}

#[test]
fn test_timeout_display() {
    let err = Error::Timeout("render fence".to_string());
    assert_eq!(format!("{}", err), "Timed out: render fence");
}

#[test]
fn test_swapchain_out_of_date_display() {
    assert_eq!(format!("{}", Error::SwapchainOutOfDate), "Swapchain out of date");
}

// ============================================================================
// RECOVERABILITY
// ============================================================================

#[test]
fn test_only_out_of_date_is_recoverable() {
    assert!(Error::SwapchainOutOfDate.is_recoverable());

    let fatal = [
        Error::BackendError("x".to_string()),
        Error::OutOfMemory,
        Error::InvalidResource("x".to_string()),
        Error::InitializationFailed("x".to_string()),
        Error::ShaderLoad("x".to_string()),
        Error::Timeout("x".to_string()),
        Error::DescriptorPoolExhausted("x".to_string()),
        Error::MalformedAsset("x".to_string()),
        Error::InvalidState("x".to_string()),
    ];
    for err in fatal {
        assert!(!err.is_recoverable(), "{:?} must be fatal", err);
    }
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug_names_variant() {
    let debug = format!("{:?}", Error::DescriptorPoolExhausted("grow".to_string()));
    assert!(debug.contains("DescriptorPoolExhausted"));
}

#[test]
fn test_error_clone_is_equal() {
    let err = Error::ShaderLoad("missing.spv".to_string());
    assert_eq!(err.clone(), err);
}

// ============================================================================
// RESULT PROPAGATION
// ============================================================================

fn failing() -> Result<u32> {
    Err(Error::InvalidState("not built".to_string()))
}

fn propagating() -> Result<u32> {
    let value = failing()?;
    Ok(value + 1)
}

#[test]
fn test_question_mark_propagates_error() {
    match propagating() {
        Err(Error::InvalidState(msg)) => assert_eq!(msg, "not built"),
        other => panic!("unexpected result: {:?}", other),
    }
}
