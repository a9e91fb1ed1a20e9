/// ShaderPipeline - linked shader objects, their layout and dynamic state
///
/// Built on VK_EXT_shader_object: there is no pipeline object, the stages
/// are bound directly and every piece of rasterizer state is dynamic. Binding
/// a pipeline unbinds every stage it does not provide.

use ash::vk;
use bytemuck::Pod;
use std::ffi::CStr;
use std::path::PathBuf;
use rosy_engine::rosy::gpu::{self, BlendMode, FrontFace, RenderState};
use rosy_engine::rosy::Result;
use rosy_engine::{engine_bail, engine_debug, engine_err};

use crate::vulkan_context::GpuContext;
use crate::vulkan_shader::{self, ShaderReflection};

const ENTRY_POINT: &CStr = c"main";

/// Where a stage's SPIR-V comes from
#[derive(Debug, Clone)]
pub enum ShaderSource {
    Path(PathBuf),
    Words(Vec<u32>),
}

impl From<PathBuf> for ShaderSource {
    fn from(path: PathBuf) -> Self {
        ShaderSource::Path(path)
    }
}

impl From<&str> for ShaderSource {
    fn from(path: &str) -> Self {
        ShaderSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u32>> for ShaderSource {
    fn from(words: Vec<u32>) -> Self {
        ShaderSource::Words(words)
    }
}

impl ShaderSource {
    fn load(&self) -> Result<Vec<u32>> {
        match self {
            ShaderSource::Path(path) => gpu::load_spirv(path),
            ShaderSource::Words(words) => Ok(words.clone()),
        }
    }
}

/// SPIR-V code as the byte slice shader creation takes, borrowed from the
/// word buffer so it keeps its 4-byte alignment
fn spirv_bytes(words: &[u32]) -> &[u8] {
    bytemuck::cast_slice(words)
}

/// Color blend equation for a blend mode, `None` when blending is off
pub fn blend_equation(mode: BlendMode) -> Option<vk::ColorBlendEquationEXT> {
    let alpha = |dst| {
        vk::ColorBlendEquationEXT::default()
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(dst)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
    };
    match mode {
        BlendMode::Disabled => None,
        BlendMode::Additive => Some(alpha(vk::BlendFactor::ONE)),
        BlendMode::AlphaBlend => Some(alpha(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)),
    }
}

fn vk_front_face(front_face: FrontFace) -> vk::FrontFace {
    match front_face {
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
    }
}

pub struct ShaderPipeline {
    name: String,
    vertex: Option<ShaderSource>,
    fragment: Option<ShaderSource>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_size: u32,

    layout: vk::PipelineLayout,
    /// Vertex first, fragment second when present
    shaders: Vec<vk::ShaderEXT>,
    constants: Vec<u8>,
}

impl ShaderPipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex: None,
            fragment: None,
            set_layouts: Vec::new(),
            push_constant_size: 0,
            layout: vk::PipelineLayout::null(),
            shaders: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn with_shaders(mut self, vertex: impl Into<ShaderSource>, fragment: impl Into<ShaderSource>) -> Self {
        self.vertex = Some(vertex.into());
        self.fragment = Some(fragment.into());
        self
    }

    /// Depth-only pipeline; the fragment stage is unbound when shading
    pub fn with_vertex_only(mut self, vertex: impl Into<ShaderSource>) -> Self {
        self.vertex = Some(vertex.into());
        self.fragment = None;
        self
    }

    /// Size the push constant range to `T`
    pub fn with_push_constants<T: Pod>(mut self) -> Self {
        self.push_constant_size = std::mem::size_of::<T>() as u32;
        self
    }

    pub fn with_set_layouts(mut self, layouts: &[vk::DescriptorSetLayout]) -> Self {
        self.set_layouts = layouts.to_vec();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn has_fragment(&self) -> bool {
        self.fragment.is_some()
    }

    pub fn is_built(&self) -> bool {
        !self.shaders.is_empty()
    }

    fn stage_flags(&self) -> vk::ShaderStageFlags {
        if self.has_fragment() {
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        } else {
            vk::ShaderStageFlags::VERTEX
        }
    }

    /// Load the stages, check them against the layout and create the shader objects
    ///
    /// # Errors
    ///
    /// `Error::ShaderLoad` for unreadable or mismatched SPIR-V, a backend
    /// error when layout or shader creation fails. Nothing is leaked on error.
    pub fn build(&mut self, ctx: &GpuContext) -> Result<()> {
        if self.is_built() {
            engine_bail!("rosy::vulkan", InvalidState => "Pipeline '{}' is already built", self.name);
        }
        let Some(vertex_source) = &self.vertex else {
            engine_bail!("rosy::vulkan", InvalidState => "Pipeline '{}' has no vertex shader", self.name);
        };
        let vertex_code = vertex_source.load()?;
        let fragment_code = self.fragment.as_ref().map(ShaderSource::load).transpose()?;

        let mut reflection: ShaderReflection = vulkan_shader::reflect_shader(&vertex_code)?;
        if let Some(code) = &fragment_code {
            reflection.merge(vulkan_shader::reflect_shader(code)?);
        }
        vulkan_shader::check_push_constant_size(&self.name, self.push_constant_size, reflection.push_constant_size)?;
        vulkan_shader::check_set_count(&self.name, &reflection, self.set_layouts.len())?;

        let stages = self.stage_flags();
        let ranges = [vk::PushConstantRange {
            stage_flags: stages,
            offset: 0,
            size: self.push_constant_size,
        }];
        let ranges: &[vk::PushConstantRange] = if self.push_constant_size > 0 { &ranges } else { &[] };

        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&self.set_layouts)
            .push_constant_ranges(ranges);
        let layout = unsafe { ctx.device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| engine_err!("rosy::vulkan", "Failed to create layout of pipeline '{}': {:?}", self.name, e))?;

        let vertex_bytes = spirv_bytes(&vertex_code);
        let fragment_bytes = fragment_code.as_deref().map(spirv_bytes);

        let link_flags = if fragment_bytes.is_some() {
            vk::ShaderCreateFlagsEXT::LINK_STAGE
        } else {
            vk::ShaderCreateFlagsEXT::empty()
        };
        let next_stage = if fragment_bytes.is_some() {
            vk::ShaderStageFlags::FRAGMENT
        } else {
            vk::ShaderStageFlags::empty()
        };

        let mut infos = vec![
            vk::ShaderCreateInfoEXT::default()
                .flags(link_flags)
                .stage(vk::ShaderStageFlags::VERTEX)
                .next_stage(next_stage)
                .code_type(vk::ShaderCodeTypeEXT::SPIRV)
                .code(vertex_bytes)
                .name(ENTRY_POINT)
                .set_layouts(&self.set_layouts)
                .push_constant_ranges(ranges),
        ];
        if let Some(bytes) = fragment_bytes {
            infos.push(
                vk::ShaderCreateInfoEXT::default()
                    .flags(link_flags)
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .code_type(vk::ShaderCodeTypeEXT::SPIRV)
                    .code(bytes)
                    .name(ENTRY_POINT)
                    .set_layouts(&self.set_layouts)
                    .push_constant_ranges(ranges),
            );
        }

        match unsafe { ctx.shader_object.create_shaders(&infos, None) } {
            Ok(shaders) => {
                for (shader, stage) in shaders.iter().zip(["vertex", "fragment"]) {
                    ctx.set_debug_name(*shader, &format!("{} {}", self.name, stage));
                }
                ctx.set_debug_name(layout, &self.name);
                self.shaders = shaders;
                self.layout = layout;
                self.constants = vec![0; self.push_constant_size as usize];
                engine_debug!("rosy::vulkan", "Built pipeline '{}' ({} stages, {} bytes of push constants)",
                    self.name, self.shaders.len(), self.push_constant_size);
                Ok(())
            }
            Err((partial, e)) => {
                unsafe {
                    for shader in partial.into_iter().filter(|s| *s != vk::ShaderEXT::null()) {
                        ctx.shader_object.destroy_shader(shader, None);
                    }
                    ctx.device.destroy_pipeline_layout(layout, None);
                }
                Err(engine_err!("rosy::vulkan", ShaderLoad =>
                    "Failed to create shaders of pipeline '{}': {:?}", self.name, e))
            }
        }
    }

    /// Bind the stages and apply `state` as dynamic state
    pub fn shade(&self, ctx: &GpuContext, cmd: vk::CommandBuffer, state: &RenderState) -> Result<()> {
        if !self.is_built() {
            engine_bail!("rosy::vulkan", InvalidState => "Pipeline '{}' is not built", self.name);
        }
        let so = &ctx.shader_object;
        let device = &ctx.device;

        // A null handle unbinds the stage
        let fragment = self.shaders.get(1).copied().unwrap_or(vk::ShaderEXT::null());
        let mut stages = vec![vk::ShaderStageFlags::VERTEX, vk::ShaderStageFlags::FRAGMENT];
        let mut bound = vec![self.shaders[0], fragment];
        if ctx.supports_tessellation {
            stages.push(vk::ShaderStageFlags::TESSELLATION_CONTROL);
            stages.push(vk::ShaderStageFlags::TESSELLATION_EVALUATION);
            bound.push(vk::ShaderEXT::null());
            bound.push(vk::ShaderEXT::null());
        }
        if ctx.supports_geometry {
            stages.push(vk::ShaderStageFlags::GEOMETRY);
            bound.push(vk::ShaderEXT::null());
        }

        let (width, height) = state.extent;
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D { offset: vk::Offset2D::default(), extent: vk::Extent2D { width, height } };
        let polygon_mode = if state.wireframe && ctx.supports_wireframe {
            vk::PolygonMode::LINE
        } else {
            vk::PolygonMode::FILL
        };
        let cull_mode = if state.culling { vk::CullModeFlags::BACK } else { vk::CullModeFlags::NONE };

        unsafe {
            so.cmd_bind_shaders(cmd, &stages, &bound);

            so.cmd_set_vertex_input(cmd, &[], &[]);
            device.cmd_set_primitive_topology(cmd, vk::PrimitiveTopology::TRIANGLE_LIST);
            device.cmd_set_primitive_restart_enable(cmd, false);
            device.cmd_set_viewport_with_count(cmd, &[viewport]);
            device.cmd_set_scissor_with_count(cmd, &[scissor]);

            device.cmd_set_rasterizer_discard_enable(cmd, false);
            so.cmd_set_polygon_mode(cmd, polygon_mode);
            device.cmd_set_line_width(cmd, 1.0);
            device.cmd_set_cull_mode(cmd, cull_mode);
            device.cmd_set_front_face(cmd, vk_front_face(state.front_face));
            so.cmd_set_depth_clip_enable(cmd, true);
            so.cmd_set_rasterization_samples(cmd, vk::SampleCountFlags::TYPE_1);
            so.cmd_set_sample_mask(cmd, vk::SampleCountFlags::TYPE_1, &[u32::MAX]);
            so.cmd_set_alpha_to_coverage_enable(cmd, false);

            device.cmd_set_depth_test_enable(cmd, state.depth_test);
            device.cmd_set_depth_write_enable(cmd, state.depth_write);
            device.cmd_set_depth_compare_op(cmd, vk::CompareOp::LESS_OR_EQUAL);
            device.cmd_set_depth_bounds_test_enable(cmd, false);
            device.cmd_set_stencil_test_enable(cmd, false);

            if self.has_fragment() {
                let equation = blend_equation(state.blending);
                so.cmd_set_color_blend_enable(cmd, 0, &[u32::from(equation.is_some())]);
                so.cmd_set_color_blend_equation(cmd, 0, &[equation.unwrap_or_default()]);
                so.cmd_set_color_write_mask(cmd, 0, &[vk::ColorComponentFlags::RGBA]);
            }
        }
        Ok(())
    }

    /// Replace the push constant blob sent by the next [`Self::push`]
    pub fn set_constants<T: Pod>(&mut self, constants: &T) -> Result<()> {
        let bytes = bytemuck::bytes_of(constants);
        if bytes.len() != self.push_constant_size as usize {
            engine_bail!("rosy::vulkan", InvalidResource =>
                "Pipeline '{}' expects {} bytes of push constants, got {}",
                self.name, self.push_constant_size, bytes.len());
        }
        self.constants.clear();
        self.constants.extend_from_slice(bytes);
        Ok(())
    }

    pub fn push(&self, ctx: &GpuContext, cmd: vk::CommandBuffer) {
        if self.constants.is_empty() {
            return;
        }
        unsafe {
            ctx.device.cmd_push_constants(cmd, self.layout, self.stage_flags(), 0, &self.constants);
        }
    }

    pub fn bind_descriptor_sets(&self, ctx: &GpuContext, cmd: vk::CommandBuffer, first_set: u32, sets: &[vk::DescriptorSet]) {
        unsafe {
            ctx.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout,
                first_set,
                sets,
                &[],
            );
        }
    }

    /// Destroy the shader objects and the layout; the pipeline can be rebuilt
    pub fn deinit(&mut self, ctx: &GpuContext) {
        unsafe {
            for shader in self.shaders.drain(..) {
                ctx.shader_object.destroy_shader(shader, None);
            }
            if self.layout != vk::PipelineLayout::null() {
                ctx.device.destroy_pipeline_layout(self.layout, None);
            }
        }
        self.layout = vk::PipelineLayout::null();
        self.constants.clear();
    }
}
