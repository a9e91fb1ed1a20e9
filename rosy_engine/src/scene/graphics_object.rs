/// Draw-ready records produced by the scene graph each frame.

use std::sync::Arc;
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;

bitflags! {
    /// Per-object flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GraphicsObjectFlags: u32 {
        /// Lives under the "mobs" subtree, stored after all static objects
        const DYNAMIC = 1 << 0;
        /// Rendered into the shadow cascades
        const CAST_SHADOW = 1 << 1;
        const VISIBLE = 1 << 2;
    }
}

impl Default for GraphicsObjectFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::CAST_SHADOW
    }
}

/// One surface of the object's mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDraw {
    pub first_index: u32,
    pub index_count: u32,
    /// Material index, `None` for the default material
    pub material: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsObject {
    /// Slot in the object buffer; static objects first, then dynamic ones
    pub index: usize,
    /// Arena index of the owning node
    pub node: usize,
    pub mesh_id: u32,
    pub transform: Mat4,
    pub surfaces: Arc<[SurfaceDraw]>,
    pub flags: GraphicsObjectFlags,
}

impl GraphicsObject {
    pub fn is_dynamic(&self) -> bool {
        self.flags.contains(GraphicsObjectFlags::DYNAMIC)
    }

    /// GPU record for this object
    pub fn gpu_data(&self) -> GpuObjectData {
        GpuObjectData {
            transform: self.transform.to_cols_array_2d(),
            normal_transform: self.transform.inverse().transpose().to_cols_array_2d(),
        }
    }
}

impl Default for GraphicsObject {
    fn default() -> Self {
        Self {
            index: 0,
            node: 0,
            mesh_id: 0,
            transform: Mat4::IDENTITY,
            surfaces: Arc::from(Vec::new()),
            flags: GraphicsObjectFlags::default(),
        }
    }
}

/// Entry of the render-data buffer, indexed by `GraphicsObject::index`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuObjectData {
    pub transform: [[f32; 4]; 4],
    pub normal_transform: [[f32; 4]; 4],
}

impl GpuObjectData {
    pub const SIZE: u64 = std::mem::size_of::<GpuObjectData>() as u64;
}
