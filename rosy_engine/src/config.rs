//! Engine configuration
//!
//! A plain struct with a `Default`, filled by the application before
//! `Rhi::init`. [`Config::validate`] rejects values the renderer cannot honor.

use crate::error::{Error, Result};
use crate::log::LogSeverity;

/// Which validation-layer messages reach the debug callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose
    All,
}

/// Where validation-layer messages are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugOutput {
    /// Colored console output (stderr)
    Console,
    /// Append to a file (no colors)
    File(String),
    /// Console and file
    Both(String),
}

/// Validation message categories to display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugMessageFilter {
    pub show_general: bool,
    pub show_validation: bool,
    pub show_performance: bool,
}

impl Default for DebugMessageFilter {
    fn default() -> Self {
        Self {
            show_general: true,
            show_validation: true,
            show_performance: true,
        }
    }
}

/// Validation message counters collected by the debug callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    /// Sum of every counter
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,

    /// Enable VK_LAYER_KHRONOS_validation and the debug messenger
    pub enable_validation: bool,

    /// Validation message severity filter
    pub debug_severity: DebugSeverity,

    /// Validation message destination
    pub debug_output: DebugOutput,

    /// Validation message category filter
    pub debug_message_filter: DebugMessageFilter,

    /// Abort the process on the first validation error
    pub break_on_validation_error: bool,

    /// Panic on the first validation error
    pub panic_on_error: bool,

    /// Count validation messages (see `get_validation_stats`)
    pub enable_validation_stats: bool,

    /// Only accept physical devices from this vendor (PCI vendor id)
    pub preferred_vendor_id: Option<u32>,

    /// Size of the off-screen draw and depth images. The swapchain may be
    /// smaller; it is never allowed to exceed this without a restart.
    pub max_draw_extent: (u32, u32),

    /// Fraction of the swapchain extent rendered into the draw image, in (0, 1]
    pub render_scale: f32,

    /// Edge length of each shadow cascade layer
    pub shadow_map_size: u32,

    /// Bound on every frame fence wait, in nanoseconds
    pub fence_timeout_ns: u64,

    /// FIFO presentation when true, MAILBOX/IMMEDIATE preferred otherwise
    pub vsync: bool,

    /// Initial `max_sets` of each per-frame descriptor allocator
    pub frame_descriptor_sets: u32,

    /// Entries below this severity are not logged
    pub min_log_severity: LogSeverity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Rosy Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            debug_output: DebugOutput::Console,
            debug_message_filter: DebugMessageFilter::default(),
            break_on_validation_error: false,
            panic_on_error: false,
            enable_validation_stats: false,
            preferred_vendor_id: None,
            max_draw_extent: (2560, 1440),
            render_scale: 1.0,
            shadow_map_size: 2048,
            fence_timeout_ns: 1_000_000_000,
            vsync: true,
            frame_descriptor_sets: 1000,
            min_log_severity: LogSeverity::Info,
        }
    }
}

impl Config {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `Error::InitializationFailed` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.render_scale > 0.0 && self.render_scale <= 1.0) {
            return Err(Error::InitializationFailed(format!(
                "render_scale must be in (0, 1], got {}",
                self.render_scale
            )));
        }
        if self.max_draw_extent.0 == 0 || self.max_draw_extent.1 == 0 {
            return Err(Error::InitializationFailed(
                "max_draw_extent must be non-zero".to_string(),
            ));
        }
        if self.shadow_map_size == 0 {
            return Err(Error::InitializationFailed(
                "shadow_map_size must be non-zero".to_string(),
            ));
        }
        if self.fence_timeout_ns == 0 {
            return Err(Error::InitializationFailed(
                "fence_timeout_ns must be non-zero".to_string(),
            ));
        }
        if self.frame_descriptor_sets == 0 {
            return Err(Error::InitializationFailed(
                "frame_descriptor_sets must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Draw extent for a given swapchain extent: scaled by `render_scale`
    /// and clamped to `max_draw_extent`, never zero.
    pub fn draw_extent(&self, swapchain_width: u32, swapchain_height: u32) -> (u32, u32) {
        let scale = |value: u32, max: u32| -> u32 {
            let scaled = (value.min(max) as f32 * self.render_scale) as u32;
            scaled.max(1)
        };
        (
            scale(swapchain_width, self.max_draw_extent.0),
            scale(swapchain_height, self.max_draw_extent.1),
        )
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
