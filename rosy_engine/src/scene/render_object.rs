/// Render objects: one indexed draw per mesh surface.
///
/// Built from the graph's graphics objects every frame and sorted with a
/// radix sort so opaque draws come first, draws sharing an index buffer are
/// adjacent and, within one buffer, draws sharing a material are adjacent.

use rdst::{RadixKey, RadixSort};
use super::graphics_object::{GpuObjectData, GraphicsObject, GraphicsObjectFlags};

/// Material buffer slot used by surfaces without a material
///
/// Asset material `i` lives at slot `i + 1`.
pub const DEFAULT_MATERIAL_SLOT: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderObject {
    pub first_index: u32,
    pub index_count: u32,
    /// Mesh the draw comes from; each mesh owns one index buffer
    pub mesh_id: u32,
    /// Raw index buffer handle
    pub index_buffer: u64,
    pub vertex_buffer_address: u64,
    pub scene_buffer_address: u64,
    pub material_buffer_address: u64,
    pub render_data_address: u64,
    /// Byte offset of the object's record in the render-data buffer
    pub render_data_offset: u64,
    pub object_index: u32,
    pub material_index: u32,
    pub blended: bool,
    pub cast_shadow: bool,
}

impl RenderObject {
    /// Blend bit on top, then mesh id (standing in for the index buffer),
    /// then material slot
    pub fn sort_key(&self) -> u64 {
        ((self.blended as u64) << 63)
            | (((self.mesh_id & (u32::MAX >> 1)) as u64) << 32)
            | self.material_index as u64
    }
}

impl RadixKey for RenderObject {
    const LEVELS: usize = 8;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        (self.sort_key() >> (level * 8)) as u8
    }
}

/// GPU buffers of one uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshBinding {
    pub index_buffer: u64,
    pub vertex_buffer_address: u64,
}

/// Device addresses shared by every draw of a frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneAddresses {
    pub scene_buffer: u64,
    pub material_buffer: u64,
    pub render_data: u64,
}

/// Fill `out` with the sorted draws of every visible object
///
/// `meshes` is indexed by mesh id, `blended_materials` by asset material.
/// Objects whose mesh has no binding, or was left without an index buffer,
/// are skipped.
pub fn build_render_objects(
    objects: &[GraphicsObject],
    meshes: &[MeshBinding],
    blended_materials: &[bool],
    addresses: SceneAddresses,
    out: &mut Vec<RenderObject>,
) {
    out.clear();

    for object in objects {
        if !object.flags.contains(GraphicsObjectFlags::VISIBLE) {
            continue;
        }
        let Some(mesh) = meshes.get(object.mesh_id as usize).filter(|m| m.index_buffer != 0) else {
            continue;
        };
        for surface in object.surfaces.iter() {
            let (material_index, blended) = match surface.material {
                Some(material) => (
                    material + 1,
                    blended_materials.get(material as usize).copied().unwrap_or(false),
                ),
                None => (DEFAULT_MATERIAL_SLOT, false),
            };
            out.push(RenderObject {
                first_index: surface.first_index,
                index_count: surface.index_count,
                mesh_id: object.mesh_id,
                index_buffer: mesh.index_buffer,
                vertex_buffer_address: mesh.vertex_buffer_address,
                scene_buffer_address: addresses.scene_buffer,
                material_buffer_address: addresses.material_buffer,
                render_data_address: addresses.render_data,
                render_data_offset: object.index as u64 * GpuObjectData::SIZE,
                object_index: object.index as u32,
                material_index,
                blended,
                cast_shadow: object.flags.contains(GraphicsObjectFlags::CAST_SHADOW),
            });
        }
    }

    out.radix_sort_unstable();
}

/// Index of the first blended draw in a sorted list
pub fn first_blended(sorted: &[RenderObject]) -> usize {
    sorted.partition_point(|r| !r.blended)
}

#[cfg(test)]
#[path = "render_object_tests.rs"]
mod tests;
