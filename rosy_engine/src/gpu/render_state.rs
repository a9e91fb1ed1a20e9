/// Per-draw rasterizer state applied as dynamic state by a shader pipeline.
///
/// Backend-neutral: the Vulkan pipeline maps each field onto the matching
/// `vkCmdSet*` call when the pipeline is bound.

/// Color attachment blending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Disabled,
    /// `src * src_alpha + dst`
    Additive,
    /// `src * src_alpha + dst * (1 - src_alpha)`
    AlphaBlend,
}

/// Winding of front-facing triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrontFace {
    #[default]
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    /// Viewport and scissor extent in pixels
    pub extent: (u32, u32),
    pub depth_test: bool,
    pub depth_write: bool,
    pub wireframe: bool,
    /// Back-face culling
    pub culling: bool,
    pub front_face: FrontFace,
    pub blending: BlendMode,
}

impl Default for RenderState {
    fn default() -> Self {
        Self::main_pass((1, 1))
    }
}

impl RenderState {
    /// Shadow cascade defaults: no culling, no wireframe, depth on, blending off
    pub fn shadow_pass(extent: (u32, u32)) -> Self {
        Self {
            extent,
            depth_test: true,
            depth_write: true,
            wireframe: false,
            culling: false,
            front_face: FrontFace::Clockwise,
            blending: BlendMode::Disabled,
        }
    }

    /// Main color pass defaults: back-face culling with clockwise front
    /// faces, no wireframe, depth on, blending off
    pub fn main_pass(extent: (u32, u32)) -> Self {
        Self {
            extent,
            depth_test: true,
            depth_write: true,
            wireframe: false,
            culling: true,
            front_face: FrontFace::Clockwise,
            blending: BlendMode::Disabled,
        }
    }

    /// State for transparent surfaces drawn after opaque ones: alpha
    /// blending, depth tested but not written
    pub fn with_alpha_blend(mut self) -> Self {
        self.blending = BlendMode::AlphaBlend;
        self.depth_write = false;
        self
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_pass_defaults() {
        let state = RenderState::shadow_pass((2048, 2048));
        assert_eq!(state.extent, (2048, 2048));
        assert!(!state.culling);
        assert!(!state.wireframe);
        assert!(state.depth_test);
        assert_eq!(state.blending, BlendMode::Disabled);
    }

    #[test]
    fn test_main_pass_defaults() {
        let state = RenderState::main_pass((1280, 720));
        assert!(state.culling);
        assert_eq!(state.front_face, FrontFace::Clockwise);
        assert!(!state.wireframe);
        assert!(state.depth_test);
        assert_eq!(state.blending, BlendMode::Disabled);
    }

    #[test]
    fn test_alpha_blend_disables_depth_write() {
        let state = RenderState::main_pass((4, 4)).with_alpha_blend();
        assert_eq!(state.blending, BlendMode::AlphaBlend);
        assert!(state.depth_test);
        assert!(!state.depth_write);
    }
}
