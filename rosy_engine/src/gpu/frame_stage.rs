/// Render orchestrator state machine.
///
/// ```text
/// Initialized ─► FrameBegun ─► ShadowPass(0) ─► ShadowPassEnded(0) ─► ShadowPass(1) ─► ...
///      ▲                                    ... ShadowPassEnded(last) ─► RenderPass ─► Presented
///      └──────────── abort (out-of-date) ◄──────────────────────────────────────────────┘ │
///                                                       Presented ─► FrameBegun ◄──────────┘
/// ```
///
/// Depth bias is enabled once before cascade 0 and disabled once after the
/// last cascade; [`FrameStateMachine::end_shadow_pass`] reports when.

use crate::engine_bail;
use crate::error::Result;

/// Number of shadow cascades rendered per frame
pub const SHADOW_CASCADE_COUNT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStage {
    Initialized,
    FrameBegun,
    ShadowPass(u32),
    ShadowPassEnded(u32),
    RenderPass,
    Presented,
    Deinitialized,
}

/// What the renderer must record when a shadow cascade ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowPassEnd {
    pub pass: u32,
    pub disable_depth_bias: bool,
}

#[derive(Debug, Clone)]
pub struct FrameStateMachine {
    stage: FrameStage,
    cascade_count: u32,
}

impl Default for FrameStateMachine {
    fn default() -> Self {
        Self::new(SHADOW_CASCADE_COUNT)
    }
}

impl FrameStateMachine {
    pub fn new(cascade_count: u32) -> Self {
        Self {
            stage: FrameStage::Initialized,
            cascade_count: cascade_count.max(1),
        }
    }

    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    pub fn cascade_count(&self) -> u32 {
        self.cascade_count
    }

    /// True between `begin_frame` and `end_frame`
    pub fn in_frame(&self) -> bool {
        !matches!(
            self.stage,
            FrameStage::Initialized | FrameStage::Presented | FrameStage::Deinitialized
        )
    }

    pub fn begin_frame(&mut self) -> Result<()> {
        match self.stage {
            FrameStage::Initialized | FrameStage::Presented => {
                self.stage = FrameStage::FrameBegun;
                Ok(())
            }
            other => engine_bail!("rosy::rhi", InvalidState => "begin_frame called in stage {:?}", other),
        }
    }

    /// Returns true when depth bias must be enabled before this pass
    pub fn begin_shadow_pass(&mut self, pass: u32) -> Result<bool> {
        if pass >= self.cascade_count {
            engine_bail!("rosy::rhi", InvalidState =>
                "shadow pass {} out of range (cascades: {})", pass, self.cascade_count);
        }
        let expected_ok = match (self.stage, pass) {
            (FrameStage::FrameBegun, 0) => true,
            (FrameStage::ShadowPassEnded(previous), n) => previous + 1 == n,
            _ => false,
        };
        if !expected_ok {
            engine_bail!("rosy::rhi", InvalidState =>
                "begin_shadow_pass({}) called in stage {:?}", pass, self.stage);
        }
        self.stage = FrameStage::ShadowPass(pass);
        Ok(pass == 0)
    }

    pub fn end_shadow_pass(&mut self) -> Result<ShadowPassEnd> {
        match self.stage {
            FrameStage::ShadowPass(pass) => {
                self.stage = FrameStage::ShadowPassEnded(pass);
                Ok(ShadowPassEnd {
                    pass,
                    disable_depth_bias: pass + 1 == self.cascade_count,
                })
            }
            other => engine_bail!("rosy::rhi", InvalidState => "end_shadow_pass called in stage {:?}", other),
        }
    }

    pub fn begin_render_pass(&mut self) -> Result<()> {
        match self.stage {
            FrameStage::ShadowPassEnded(pass) if pass + 1 == self.cascade_count => {
                self.stage = FrameStage::RenderPass;
                Ok(())
            }
            other => engine_bail!("rosy::rhi", InvalidState => "render_pass called in stage {:?}", other),
        }
    }

    pub fn end_frame(&mut self) -> Result<()> {
        match self.stage {
            FrameStage::RenderPass => {
                self.stage = FrameStage::Presented;
                Ok(())
            }
            other => engine_bail!("rosy::rhi", InvalidState => "end_frame called in stage {:?}", other),
        }
    }

    /// Abandon the frame in flight (swapchain out of date); the next
    /// `begin_frame` starts from scratch.
    pub fn abort_frame(&mut self) {
        if self.stage != FrameStage::Deinitialized {
            self.stage = FrameStage::Initialized;
        }
    }

    pub fn deinit(&mut self) {
        self.stage = FrameStage::Deinitialized;
    }
}

#[cfg(test)]
#[path = "frame_stage_tests.rs"]
mod tests;
