/// GraphScene - draws an asset's scene graph with cascaded shadows
///
/// GPU data layout:
/// - one storage buffer of materials, slot 0 being the default material
/// - per frame slot, a scene buffer (camera, light, cascades) and a
///   render-data buffer of [`GpuObjectData`] indexed by object index; the
///   static range is written once per slot, the dynamic range every frame
/// - shaders read vertices, scene, render data and materials through buffer
///   device addresses carried in [`DrawConstants`]

use ash::vk;
use ash::vk::Handle;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use gpu_allocator::MemoryLocation;
use std::path::PathBuf;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use rosy_engine::rosy::gpu::{MAX_FRAMES_IN_FLIGHT, RenderState};
use rosy_engine::rosy::scene::{
    build_render_objects, first_blended, AlphaMode, Asset, Camera, GpuObjectData, GraphicsObject, MeshBinding,
    RenderObject, SceneAddresses, SceneGraph, ShadowCascades, NO_INDEX,
};
use rosy_engine::rosy::Result;
use rosy_engine::{engine_bail, engine_info};

use crate::vulkan_buffer::AllocatedBuffer;
use crate::vulkan_descriptor::{DescriptorLayoutBuilder, DescriptorWriter};
use crate::vulkan_image::AllocatedImage;
use crate::vulkan_pipeline::ShaderPipeline;
use crate::vulkan_resources::{self, GpuMeshBuffers};
use crate::vulkan_rhi::Rhi;
use crate::vulkan_scene::{Scene, UiFrame};

/// Push constants shared by the shadow and mesh pipelines
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DrawConstants {
    pub scene: u64,
    pub vertices: u64,
    pub render_data: u64,
    pub materials: u64,
    pub object_index: u32,
    pub material_index: u32,
    pub cascade: u32,
    pub _pad: u32,
}

impl DrawConstants {
    pub fn for_draw(object: &RenderObject, cascade: u32) -> Self {
        Self {
            scene: object.scene_buffer_address,
            vertices: object.vertex_buffer_address,
            render_data: object.render_data_address,
            materials: object.material_buffer_address,
            object_index: object.object_index,
            material_index: object.material_index,
            cascade,
            _pad: 0,
        }
    }
}

/// Per-frame camera and light data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSceneData {
    pub view_projection: [[f32; 4]; 4],
    pub light_view_projections: [[[f32; 4]; 4]; 3],
    pub camera_position: [f32; 4],
    /// xyz toward the light, w unused
    pub light_direction: [f32; 4],
    pub cascade_splits: [f32; 4],
}

impl GpuSceneData {
    pub fn new(camera: &Camera, aspect: f32, light_direction: Vec3, cascades: &ShadowCascades) -> Self {
        let light = light_direction.normalize_or_zero();
        Self {
            view_projection: camera.view_projection(aspect).to_cols_array_2d(),
            light_view_projections: cascades.view_projections.map(|m| m.to_cols_array_2d()),
            camera_position: camera.position.extend(1.0).to_array(),
            light_direction: light.extend(0.0).to_array(),
            cascade_splits: [cascades.splits[0], cascades.splits[1], cascades.splits[2], 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub base_color: [f32; 4],
    /// metallic, roughness, 1.0 when a color texture is bound, unused
    pub params: [f32; 4],
}

impl Default for GpuMaterial {
    fn default() -> Self {
        Self { base_color: [1.0; 4], params: [0.0, 1.0, 0.0, 0.0] }
    }
}

/// Material buffer contents: the default material, then one per asset material
pub fn gpu_materials(asset: &Asset) -> Vec<GpuMaterial> {
    std::iter::once(GpuMaterial::default())
        .chain(asset.materials.iter().map(|m| GpuMaterial {
            base_color: m.base_color,
            params: [m.metallic, m.roughness, if m.color_image == NO_INDEX { 0.0 } else { 1.0 }, 0.0],
        }))
        .collect()
}

/// Which draws a pass issues
pub fn shadow_casters(objects: &[RenderObject]) -> impl Iterator<Item = &RenderObject> {
    objects.iter().filter(|o| o.cast_shadow && !o.blended && o.index_buffer != 0)
}

const DEFAULT_LIGHT_DIRECTION: Vec3 = Vec3::new(0.4, 1.0, 0.3);

/// Everything created by [`Scene::build`]
struct SceneGpu {
    meshes: Vec<Option<GpuMeshBuffers>>,
    images: Vec<AllocatedImage>,
    default_image: AllocatedImage,
    samplers: Vec<vk::Sampler>,
    default_sampler: vk::Sampler,
    material_buffer: AllocatedBuffer,
    material_layout: vk::DescriptorSetLayout,
    material_sets: Vec<vk::DescriptorSet>,
    frame_layout: vk::DescriptorSetLayout,
    scene_buffers: Vec<AllocatedBuffer>,
    render_data_buffers: Vec<AllocatedBuffer>,
    static_written: Vec<bool>,
    shadow_pipeline: ShaderPipeline,
    mesh_pipeline: ShaderPipeline,
}

#[derive(Debug, Clone, Copy, Default)]
struct FrameStats {
    dt: f32,
    draws: usize,
    shadow_draws: usize,
}

pub struct GraphScene {
    asset: Asset,
    shader_dir: PathBuf,
    graph: SceneGraph,
    camera: Camera,
    light_direction: Vec3,
    wireframe: bool,

    mesh_bindings: Vec<MeshBinding>,
    blended_materials: Vec<bool>,
    objects: Vec<GraphicsObject>,
    render_objects: Vec<RenderObject>,
    cascades: Option<ShadowCascades>,
    stats: FrameStats,

    gpu: Option<SceneGpu>,
}

impl GraphScene {
    /// Scene for `asset`, loading `mesh.vert.spv`, `mesh.frag.spv` and
    /// `shadow.vert.spv` from `shader_dir` at build time
    pub fn new(asset: Asset, shader_dir: impl Into<PathBuf>) -> Self {
        Self {
            asset,
            shader_dir: shader_dir.into(),
            graph: SceneGraph::new(),
            camera: Camera::default(),
            light_direction: DEFAULT_LIGHT_DIRECTION,
            wireframe: false,
            mesh_bindings: Vec::new(),
            blended_materials: Vec::new(),
            objects: Vec::new(),
            render_objects: Vec::new(),
            cascades: None,
            stats: FrameStats::default(),
            gpu: None,
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// For moving nodes between frames
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_light_direction(&mut self, direction: Vec3) {
        self.light_direction = direction;
    }

    pub fn render_objects(&self) -> &[RenderObject] {
        &self.render_objects
    }

    pub fn is_built(&self) -> bool {
        self.gpu.is_some()
    }

    fn build_gpu(&mut self, rhi: &mut Rhi) -> Result<SceneGpu> {
        let resources = rhi.resources();
        let ctx = std::sync::Arc::clone(rhi.ctx());

        let mut meshes = Vec::with_capacity(self.asset.meshes.len());
        self.mesh_bindings.clear();
        for mesh in &self.asset.meshes {
            if mesh.indices.is_empty() || mesh.vertices.is_empty() {
                meshes.push(None);
                self.mesh_bindings.push(MeshBinding::default());
                continue;
            }
            let buffers = resources.upload_mesh(&mesh.name, &mesh.indices, &mesh.vertices)?;
            self.mesh_bindings.push(MeshBinding {
                index_buffer: buffers.index_buffer.handle().as_raw(),
                vertex_buffer_address: buffers.vertex_buffer_address,
            });
            meshes.push(Some(buffers));
        }

        let mut images = Vec::with_capacity(self.asset.images.len());
        for image in &self.asset.images {
            images.push(resources.create_image_with_data(
                &image.name,
                &image.pixels,
                vk::Extent2D { width: image.width, height: image.height },
                vk::Format::R8G8B8A8_SRGB,
                vk::ImageUsageFlags::SAMPLED,
                true,
            )?);
        }
        let default_image = resources.create_image_with_data(
            "default white",
            &[255; 4],
            vk::Extent2D { width: 1, height: 1 },
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageUsageFlags::SAMPLED,
            false,
        )?;

        let material_buffer = resources.upload_buffer(
            "materials",
            bytemuck::cast_slice(&gpu_materials(&self.asset)),
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS,
        )?;

        // Samplers and layouts are not RAII; collect them so a failure can free them
        let mut samplers = Vec::with_capacity(self.asset.samplers.len());
        let result = (|| -> Result<(vk::Sampler, vk::DescriptorSetLayout, vk::DescriptorSetLayout)> {
            for (i, sampler) in self.asset.samplers.iter().enumerate() {
                samplers.push(resources.create_sampler(&format!("sampler {}", i), &vulkan_resources::sampler_info(sampler))?);
            }
            let default_sampler = resources.create_sampler(
                "default sampler",
                &vulkan_resources::sampler_info(&Default::default()),
            )?;
            samplers.push(default_sampler);
            let material_layout = DescriptorLayoutBuilder::new()
                .add_binding(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .build(&ctx, vk::ShaderStageFlags::FRAGMENT, "material layout")?;
            match DescriptorLayoutBuilder::new()
                .add_binding(0, vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .build(&ctx, vk::ShaderStageFlags::FRAGMENT, "frame layout")
            {
                Ok(frame_layout) => Ok((default_sampler, material_layout, frame_layout)),
                Err(e) => {
                    unsafe { ctx.device.destroy_descriptor_set_layout(material_layout, None) };
                    Err(e)
                }
            }
        })();
        let (default_sampler, material_layout, frame_layout) = match result {
            Ok(created) => {
                samplers.pop();
                created
            }
            Err(e) => {
                for sampler in samplers {
                    resources.destroy_sampler(sampler);
                }
                return Err(e);
            }
        };

        let mut gpu = SceneGpu {
            meshes,
            images,
            default_image,
            samplers,
            default_sampler,
            material_buffer,
            material_layout,
            material_sets: Vec::new(),
            frame_layout,
            scene_buffers: Vec::new(),
            render_data_buffers: Vec::new(),
            static_written: vec![false; MAX_FRAMES_IN_FLIGHT],
            shadow_pipeline: ShaderPipeline::new("shadow")
                .with_vertex_only(self.shader_dir.join("shadow.vert.spv"))
                .with_push_constants::<DrawConstants>(),
            mesh_pipeline: ShaderPipeline::new("mesh")
                .with_shaders(self.shader_dir.join("mesh.vert.spv"), self.shader_dir.join("mesh.frag.spv"))
                .with_push_constants::<DrawConstants>()
                .with_set_layouts(&[material_layout, frame_layout]),
        };

        if let Err(e) = self.finish_gpu(rhi, &mut gpu) {
            Self::release_gpu(rhi, gpu);
            return Err(e);
        }
        Ok(gpu)
    }

    /// Steps of the build that need an already assembled [`SceneGpu`]
    fn finish_gpu(&mut self, rhi: &mut Rhi, gpu: &mut SceneGpu) -> Result<()> {
        let object_bytes = self.graph.object_count().max(1) as u64 * GpuObjectData::SIZE;
        let usage = vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            let resources = rhi.resources();
            gpu.scene_buffers.push(resources.create_buffer(
                &format!("scene data {}", slot),
                std::mem::size_of::<GpuSceneData>() as u64,
                usage,
                MemoryLocation::CpuToGpu,
            )?);
            gpu.render_data_buffers.push(resources.create_buffer(
                &format!("render data {}", slot),
                object_bytes,
                usage,
                MemoryLocation::CpuToGpu,
            )?);
        }

        // Slot 0 is the default material
        let ctx = std::sync::Arc::clone(rhi.ctx());
        let slots = std::iter::once(None).chain(self.asset.materials.iter().map(Some));
        let mut writer = DescriptorWriter::new();
        for material in slots {
            let set = rhi.allocate_global_set(gpu.material_layout)?;
            let view = material
                .and_then(|m| gpu.images.get(m.color_image as usize))
                .unwrap_or(&gpu.default_image)
                .view();
            let sampler = material
                .and_then(|m| gpu.samplers.get(m.color_sampler as usize))
                .copied()
                .unwrap_or(gpu.default_sampler);
            writer.clear();
            writer
                .write_image(
                    0,
                    view,
                    sampler,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                )
                .update_set(&ctx.device, set);
            gpu.material_sets.push(set);
        }

        gpu.shadow_pipeline.build(&ctx)?;
        gpu.mesh_pipeline.build(&ctx)?;
        Ok(())
    }

    fn release_gpu(rhi: &mut Rhi, mut gpu: SceneGpu) {
        let ctx = std::sync::Arc::clone(rhi.ctx());
        gpu.shadow_pipeline.deinit(&ctx);
        gpu.mesh_pipeline.deinit(&ctx);
        unsafe {
            ctx.device.destroy_descriptor_set_layout(gpu.material_layout, None);
            ctx.device.destroy_descriptor_set_layout(gpu.frame_layout, None);
        }
        for sampler in gpu.samplers.drain(..) {
            rhi.resources().destroy_sampler(sampler);
        }
        rhi.resources().destroy_sampler(gpu.default_sampler);
        // Buffers and images are freed on drop
    }

    fn write_frame_data(&mut self, rhi: &Rhi) -> Result<()> {
        let Some(gpu) = self.gpu.as_mut() else {
            engine_bail!("rosy::scene", InvalidState => "Scene updated before build");
        };
        let slot = rhi.current_slot();
        let aspect = rhi.aspect_ratio();
        let cascades = ShadowCascades::compute(&self.camera, aspect, self.light_direction, rhi.config().shadow_map_size);

        let scene_data = GpuSceneData::new(&self.camera, aspect, self.light_direction, &cascades);
        gpu.scene_buffers[slot].write_pod(0, &[scene_data])?;

        let records: Vec<GpuObjectData> = self.objects.iter().map(GraphicsObject::gpu_data).collect();
        let render_data = &mut gpu.render_data_buffers[slot];
        if !gpu.static_written[slot] {
            let range = self.graph.static_range();
            render_data.write_pod(range.start as u64 * GpuObjectData::SIZE, &records[range])?;
            gpu.static_written[slot] = true;
        }
        let range = self.graph.dynamic_range();
        render_data.write_pod(range.start as u64 * GpuObjectData::SIZE, &records[range])?;

        let addresses = SceneAddresses {
            scene_buffer: gpu.scene_buffers[slot].device_address(),
            material_buffer: gpu.material_buffer.device_address(),
            render_data: gpu.render_data_buffers[slot].device_address(),
        };
        build_render_objects(&self.objects, &self.mesh_bindings, &self.blended_materials, addresses, &mut self.render_objects);
        self.cascades = Some(cascades);
        Ok(())
    }
}

impl Scene for GraphScene {
    fn build(&mut self, rhi: &mut Rhi) -> Result<()> {
        if self.gpu.is_some() {
            engine_bail!("rosy::scene", InvalidState => "Scene '{}' is already built", self.asset.name);
        }
        self.graph.set_asset(&self.asset)?;
        self.blended_materials = self.asset.materials.iter().map(|m| m.alpha_mode == AlphaMode::Blend).collect();

        match self.build_gpu(rhi) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                self.graph.clear();
                self.mesh_bindings.clear();
                self.blended_materials.clear();
                return Err(e);
            }
        }
        engine_info!("rosy::scene", "Built scene '{}': {} static and {} dynamic objects, {} meshes",
            self.asset.name, self.graph.static_count(), self.graph.dynamic_count(), self.asset.meshes.len());
        Ok(())
    }

    fn handle_window_event(&mut self, event: &WindowEvent) -> Result<()> {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if let PhysicalKey::Code(code) = event.physical_key {
                let pressed = event.state == ElementState::Pressed;
                if code == KeyCode::F1 && pressed && !event.repeat {
                    self.wireframe = !self.wireframe;
                } else {
                    self.camera.handle_key(code, pressed);
                }
            }
        }
        Ok(())
    }

    fn handle_mouse_motion(&mut self, delta: (f64, f64)) -> Result<()> {
        self.camera.handle_mouse_motion(delta.0, delta.1);
        Ok(())
    }

    fn update(&mut self, rhi: &mut Rhi, dt: f32) -> Result<()> {
        self.camera.integrate(dt);
        self.graph.update_transforms();
        self.graph.populate_graph(&mut self.objects);
        self.write_frame_data(rhi)?;
        self.stats.dt = dt;
        Ok(())
    }

    fn draw_shadows(&mut self, rhi: &mut Rhi, pass: u32) -> Result<()> {
        let Some(gpu) = self.gpu.as_mut() else {
            engine_bail!("rosy::scene", InvalidState => "Scene drawn before build");
        };
        let ctx = rhi.ctx();
        let cmd = rhi.command_buffer()?;
        gpu.shadow_pipeline.shade(ctx, cmd, &rhi.render_state())?;

        if pass == 0 {
            self.stats.shadow_draws = 0;
        }
        let mut bound_index_buffer = 0;
        for object in shadow_casters(&self.render_objects) {
            if object.index_buffer != bound_index_buffer {
                unsafe {
                    ctx.device.cmd_bind_index_buffer(cmd, vk::Buffer::from_raw(object.index_buffer), 0, vk::IndexType::UINT32);
                }
                bound_index_buffer = object.index_buffer;
            }
            gpu.shadow_pipeline.set_constants(&DrawConstants::for_draw(object, pass))?;
            gpu.shadow_pipeline.push(ctx, cmd);
            unsafe { ctx.device.cmd_draw_indexed(cmd, object.index_count, 1, object.first_index, 0, 0) };
            self.stats.shadow_draws += 1;
        }
        Ok(())
    }

    fn draw(&mut self, rhi: &mut Rhi) -> Result<()> {
        let Some(gpu) = self.gpu.as_mut() else {
            engine_bail!("rosy::scene", InvalidState => "Scene drawn before build");
        };

        // Shadow cascades for the fragment shader, fresh every frame
        let frame_set = rhi.allocate_frame_set(gpu.frame_layout)?;
        let ctx = rhi.ctx();
        let mut writer = DescriptorWriter::new();
        writer
            .write_image(
                0,
                rhi.shadow_map().view(),
                rhi.shadow_sampler(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            )
            .update_set(&ctx.device, frame_set);

        let cmd = rhi.command_buffer()?;
        let opaque_state: RenderState = rhi.render_state().with_wireframe(self.wireframe);
        gpu.mesh_pipeline.shade(ctx, cmd, &opaque_state)?;
        gpu.mesh_pipeline.bind_descriptor_sets(ctx, cmd, 1, &[frame_set]);

        let blended_from = first_blended(&self.render_objects);
        let mut blending = false;
        let mut bound_index_buffer = 0;
        let mut bound_material = None;
        let mut draws = 0;
        for (i, object) in self.render_objects.iter().enumerate() {
            if i >= blended_from && !blending {
                gpu.mesh_pipeline.shade(ctx, cmd, &opaque_state.with_alpha_blend())?;
                blending = true;
            }
            if object.index_buffer == 0 {
                continue;
            }
            if bound_material != Some(object.material_index) {
                if let Some(&set) = gpu.material_sets.get(object.material_index as usize) {
                    gpu.mesh_pipeline.bind_descriptor_sets(ctx, cmd, 0, &[set]);
                }
                bound_material = Some(object.material_index);
            }
            if object.index_buffer != bound_index_buffer {
                unsafe {
                    ctx.device.cmd_bind_index_buffer(cmd, vk::Buffer::from_raw(object.index_buffer), 0, vk::IndexType::UINT32);
                }
                bound_index_buffer = object.index_buffer;
            }
            gpu.mesh_pipeline.set_constants(&DrawConstants::for_draw(object, 0))?;
            gpu.mesh_pipeline.push(ctx, cmd);
            unsafe { ctx.device.cmd_draw_indexed(cmd, object.index_count, 1, object.first_index, 0, 0) };
            draws += 1;
        }
        self.stats.draws = draws;
        Ok(())
    }

    fn draw_ui(&mut self, ui: &mut UiFrame) -> Result<()> {
        let fps = if self.stats.dt > 0.0 { 1.0 / self.stats.dt } else { 0.0 };
        let position = self.camera.position;
        let lines = ui.window("Rosy");
        lines.push(format!("{:.1} fps ({:.2} ms)", fps, self.stats.dt * 1000.0));
        lines.push(format!("{} objects, {} draws, {} shadow draws",
            self.objects.len(), self.stats.draws, self.stats.shadow_draws));
        lines.push(format!("camera {:.1} {:.1} {:.1}", position.x, position.y, position.z));
        if self.wireframe {
            lines.push("wireframe".to_string());
        }
        Ok(())
    }

    fn deinit(&mut self, rhi: &mut Rhi) -> Result<()> {
        if let Some(gpu) = self.gpu.take() {
            rhi.ctx().wait_idle()?;
            Self::release_gpu(rhi, gpu);
        }
        self.graph.clear();
        self.objects.clear();
        self.render_objects.clear();
        self.mesh_bindings.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosy_engine::rosy::scene::Material;

    #[test]
    fn test_draw_constants_layout() {
        assert_eq!(std::mem::size_of::<DrawConstants>(), 48);
        assert_eq!(std::mem::size_of::<GpuMaterial>(), 32);
        assert_eq!(std::mem::size_of::<GpuSceneData>(), 304);
    }

    #[test]
    fn test_default_material_first() {
        let mut asset = Asset::default();
        asset.materials.push(Material {
            base_color: [0.5, 0.0, 0.0, 1.0],
            metallic: 0.25,
            color_image: 0,
            ..Default::default()
        });
        let materials = gpu_materials(&asset);
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0], GpuMaterial::default());
        assert_eq!(materials[1].base_color, [0.5, 0.0, 0.0, 1.0]);
        assert_eq!(materials[1].params, [0.25, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_shadow_casters_skip_blended_and_unbound() {
        let caster = RenderObject { index_buffer: 7, cast_shadow: true, ..Default::default() };
        let blended = RenderObject { blended: true, ..caster };
        let no_shadow = RenderObject { cast_shadow: false, ..caster };
        let unbound = RenderObject { index_buffer: 0, ..caster };
        let objects = [caster, blended, no_shadow, unbound];
        assert_eq!(shadow_casters(&objects).count(), 1);
    }

    #[test]
    fn test_constants_copy_draw_addresses() {
        let object = RenderObject {
            scene_buffer_address: 1,
            vertex_buffer_address: 2,
            render_data_address: 3,
            material_buffer_address: 4,
            object_index: 5,
            material_index: 6,
            ..Default::default()
        };
        let constants = DrawConstants::for_draw(&object, 2);
        assert_eq!((constants.scene, constants.vertices, constants.render_data, constants.materials), (1, 2, 3, 4));
        assert_eq!((constants.object_index, constants.material_index, constants.cascade), (5, 6, 2));
    }
}
