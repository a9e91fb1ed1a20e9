//! Error types for the Rosy engine
//!
//! Every fallible engine operation returns [`Result`]. Only
//! [`Error::SwapchainOutOfDate`] is recoverable inside the frame loop;
//! everything else terminates the loop or aborts the operation that raised it.

use std::fmt;

/// Result type for Rosy engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Rosy engine errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan call failure, lock poisoning, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, image, shader, etc.)
    InvalidResource(String),

    /// Initialization failed (instance, device, swapchain, subsystems)
    InitializationFailed(String),

    /// Shader binary missing, mis-sized or not SPIR-V
    ShaderLoad(String),

    /// Swapchain no longer matches the surface, recreate it and retry
    SwapchainOutOfDate,

    /// A bounded fence wait expired
    Timeout(String),

    /// Descriptor allocation failed even after growing the pool set
    DescriptorPoolExhausted(String),

    /// Asset or scene data violates its structural contract
    MalformedAsset(String),

    /// Operation called out of order (frame state machine, pipeline not built)
    InvalidState(String),
}

impl Error {
    /// True only for errors the frame loop can recover from by
    /// recreating the swapchain.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SwapchainOutOfDate)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::ShaderLoad(msg) => write!(f, "Shader load failed: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
            Error::Timeout(msg) => write!(f, "Timed out: {}", msg),
            Error::DescriptorPoolExhausted(msg) => write!(f, "Descriptor pool exhausted: {}", msg),
            Error::MalformedAsset(msg) => write!(f, "Malformed asset: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
