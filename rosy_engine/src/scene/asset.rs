/// In-memory asset model consumed by the scene graph and the GPU uploader.
///
/// Cross references are plain `u32` indices into the owning vectors;
/// [`NO_INDEX`] means "none". Reading and writing the on-disk format is done
/// by an external tool; this module only defines the contract and checks it.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use crate::engine_bail;
use crate::error::Result;

/// Sentinel meaning "no reference"
pub const NO_INDEX: u32 = u32::MAX;

/// Interleaved vertex, 48 bytes, read by shaders through a device address
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv_x: f32,
    pub normal: [f32; 3],
    pub uv_y: f32,
    pub color: [f32; 4],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2], color: [f32; 4]) -> Self {
        Self {
            position,
            uv_x: uv[0],
            normal,
            uv_y: uv[1],
            color,
        }
    }
}

/// Index range of a mesh drawn with one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub start_index: u32,
    pub count: u32,
    pub material: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub surfaces: Vec<Surface>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Blend,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Index into `Asset::images`, or `NO_INDEX`
    pub color_image: u32,
    /// Index into `Asset::samplers`, or `NO_INDEX`
    pub color_sampler: u32,
    pub alpha_mode: AlphaMode,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [1.0; 4],
            metallic: 0.0,
            roughness: 1.0,
            color_image: NO_INDEX,
            color_sampler: NO_INDEX,
            alpha_mode: AlphaMode::Opaque,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sampler {
    pub mag_filter: Filter,
    pub min_filter: Filter,
}

/// Decoded RGBA8 image
#[derive(Debug, Clone, Default)]
pub struct Image {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// Transform relative to the parent
    pub transform: Mat4,
    /// Index into `Asset::meshes`, or `NO_INDEX`
    pub mesh_id: u32,
    /// Indices into `Asset::nodes`
    pub children: Vec<u32>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            mesh_id: NO_INDEX,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetScene {
    pub name: String,
    /// Root node indices
    pub nodes: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Asset {
    pub name: String,
    pub nodes: Vec<Node>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub samplers: Vec<Sampler>,
    pub images: Vec<Image>,
    pub scenes: Vec<AssetScene>,
    pub root_scene: u32,
}

fn optional_index_ok(index: u32, len: usize) -> bool {
    index == NO_INDEX || (index as usize) < len
}

impl Asset {
    /// Root node indices of the root scene
    pub fn root_nodes(&self) -> &[u32] {
        self.scenes
            .get(self.root_scene as usize)
            .map(|scene| scene.nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Check every cross reference
    ///
    /// # Errors
    ///
    /// `Error::MalformedAsset` describing the first violation.
    pub fn validate(&self) -> Result<()> {
        const SOURCE: &str = "rosy::asset";

        if self.root_scene as usize >= self.scenes.len() {
            engine_bail!(SOURCE, MalformedAsset =>
                "root_scene {} out of range ({} scenes)", self.root_scene, self.scenes.len());
        }
        for (scene_index, scene) in self.scenes.iter().enumerate() {
            if let Some(&bad) = scene.nodes.iter().find(|&&n| n as usize >= self.nodes.len()) {
                engine_bail!(SOURCE, MalformedAsset =>
                    "scene {} references node {} ({} nodes)", scene_index, bad, self.nodes.len());
            }
        }

        for (node_index, node) in self.nodes.iter().enumerate() {
            if node.name.is_empty() {
                engine_bail!(SOURCE, MalformedAsset => "node {} has no name", node_index);
            }
            if !optional_index_ok(node.mesh_id, self.meshes.len()) {
                engine_bail!(SOURCE, MalformedAsset =>
                    "node '{}' references mesh {} ({} meshes)", node.name, node.mesh_id, self.meshes.len());
            }
            for &child in &node.children {
                if child as usize >= self.nodes.len() || child as usize == node_index {
                    engine_bail!(SOURCE, MalformedAsset =>
                        "node '{}' has invalid child index {}", node.name, child);
                }
            }
        }

        for mesh in &self.meshes {
            if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
                engine_bail!(SOURCE, MalformedAsset =>
                    "mesh '{}' index {} exceeds {} vertices", mesh.name, bad, mesh.vertices.len());
            }
            for surface in &mesh.surfaces {
                let end = surface.start_index as u64 + surface.count as u64;
                if end > mesh.indices.len() as u64 {
                    engine_bail!(SOURCE, MalformedAsset =>
                        "mesh '{}' surface [{}, {}) exceeds {} indices",
                        mesh.name, surface.start_index, end, mesh.indices.len());
                }
                if !optional_index_ok(surface.material, self.materials.len()) {
                    engine_bail!(SOURCE, MalformedAsset =>
                        "mesh '{}' surface references material {}", mesh.name, surface.material);
                }
            }
        }

        for material in &self.materials {
            if !optional_index_ok(material.color_image, self.images.len())
                || !optional_index_ok(material.color_sampler, self.samplers.len())
            {
                engine_bail!(SOURCE, MalformedAsset =>
                    "material '{}' references a missing image or sampler", material.name);
            }
        }

        for image in &self.images {
            let expected = image.width as u64 * image.height as u64 * 4;
            if image.width == 0 || image.height == 0 || image.pixels.len() as u64 != expected {
                engine_bail!(SOURCE, MalformedAsset =>
                    "image '{}' is {}x{} but holds {} bytes", image.name, image.width, image.height, image.pixels.len());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "asset_tests.rs"]
mod tests;
