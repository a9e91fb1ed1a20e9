//! Procedural demo asset
//!
//! A textured ground plane, a few static crates, a translucent pane and a
//! `mobs` subtree of cubes that the demo moves every frame.

use glam::{Mat4, Quat, Vec3};
use rosy_engine::rosy::scene::{
    AlphaMode, Asset, AssetScene, Filter, Image, Material, Mesh, Node, Sampler, Surface, Vertex, DYNAMIC_ROOT_NAME,
    NO_INDEX,
};

pub const ASSET_NAME: &str = "demo";
pub const MOB_COUNT: usize = 6;

const CHECKER_SIZE: u32 = 64;

const GROUND_MATERIAL: u32 = 0;
const CRATE_MATERIAL: u32 = 1;
const MOB_MATERIAL: u32 = 2;
const GLASS_MATERIAL: u32 = 3;

const PLANE_MESH: u32 = 0;
const CUBE_MESH: u32 = 1;
const MOB_MESH: u32 = 2;
const PANE_MESH: u32 = 3;

pub fn mob_name(index: usize) -> String {
    format!("mob_{}", index)
}

/// Single-surface mesh
fn mesh(name: &str, vertices: Vec<Vertex>, indices: Vec<u32>, material: u32) -> Mesh {
    Mesh {
        name: name.to_string(),
        surfaces: vec![Surface { start_index: 0, count: indices.len() as u32, material }],
        vertices,
        indices,
    }
}

/// Square in the XZ plane facing +Y
pub fn plane(name: &str, half_extent: f32, uv_repeat: f32, material: u32) -> Mesh {
    let h = half_extent;
    let color = [1.0; 4];
    let normal = [0.0, 1.0, 0.0];
    let vertices = vec![
        Vertex::new([-h, 0.0, -h], normal, [0.0, 0.0], color),
        Vertex::new([-h, 0.0, h], normal, [0.0, uv_repeat], color),
        Vertex::new([h, 0.0, h], normal, [uv_repeat, uv_repeat], color),
        Vertex::new([h, 0.0, -h], normal, [uv_repeat, 0.0], color),
    ];
    mesh(name, vertices, vec![0, 1, 2, 2, 3, 0], material)
}

/// Unit cube centered on the origin, 4 vertices per face
pub fn cube(name: &str, color: [f32; 4], material: u32) -> Mesh {
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // normal, tangent, bitangent
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, tangent, bitangent) in FACES {
        let (n, t, b) = (Vec3::from(normal), Vec3::from(tangent), Vec3::from(bitangent));
        let base = vertices.len() as u32;
        for (u, v) in [(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)] {
            let position = (n + t * (u * 2.0 - 1.0) + b * (1.0 - v * 2.0)) * 0.5;
            vertices.push(Vertex::new(position.to_array(), normal, [u, v], color));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    mesh(name, vertices, indices, material)
}

/// Two-tone RGBA8 checkerboard
pub fn checker(size: u32, cells: u32) -> Image {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / cell) + (y / cell)) % 2 == 0;
            let value = if light { 200 } else { 90 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    Image { name: "checker".to_string(), width: size, height: size, pixels }
}

fn node(name: impl Into<String>, mesh_id: u32, transform: Mat4) -> Node {
    let mut node = Node::new(name);
    node.mesh_id = mesh_id;
    node.transform = transform;
    node
}

/// Where mob `index` of `count` sits at time `t`
pub fn mob_transform(index: usize, count: usize, t: f32) -> Mat4 {
    let phase = index as f32 / count.max(1) as f32 * std::f32::consts::TAU;
    let angle = phase + t * 0.5;
    let radius = 6.0;
    let height = 1.0 + (t * 2.0 + phase).sin().abs() * 1.5;
    Mat4::from_rotation_translation(
        Quat::from_rotation_y(angle * 2.0),
        Vec3::new(angle.cos() * radius, height, angle.sin() * radius),
    )
}

pub fn build() -> Asset {
    let materials = vec![
        Material {
            name: "ground".to_string(),
            color_image: 0,
            color_sampler: 0,
            roughness: 0.9,
            ..Default::default()
        },
        Material {
            name: "crate".to_string(),
            base_color: [0.75, 0.5, 0.3, 1.0],
            roughness: 0.6,
            ..Default::default()
        },
        Material {
            name: "mob".to_string(),
            base_color: [0.9, 0.2, 0.25, 1.0],
            metallic: 0.3,
            roughness: 0.4,
            ..Default::default()
        },
        Material {
            name: "glass".to_string(),
            base_color: [0.4, 0.7, 1.0, 0.35],
            roughness: 0.1,
            alpha_mode: AlphaMode::Blend,
            ..Default::default()
        },
    ];

    let meshes = vec![
        plane("ground", 20.0, 10.0, GROUND_MATERIAL),
        cube("crate", [1.0; 4], CRATE_MATERIAL),
        cube("mob", [1.0; 4], MOB_MATERIAL),
        cube("pane", [1.0; 4], GLASS_MATERIAL),
    ];

    let mut nodes = vec![node("ground", PLANE_MESH, Mat4::IDENTITY)];
    let crates = [(-3.0, 0.5, -2.0, 1.0), (2.5, 0.75, -4.0, 1.5), (0.0, 0.4, 3.0, 0.8)];
    let crates_root = nodes.len() as u32;
    nodes.push(node("crates", NO_INDEX, Mat4::IDENTITY));
    for (i, (x, y, z, scale)) in crates.into_iter().enumerate() {
        let index = nodes.len() as u32;
        nodes.push(node(
            format!("crate_{}", i),
            CUBE_MESH,
            Mat4::from_scale_rotation_translation(Vec3::splat(scale), Quat::from_rotation_y(i as f32 * 0.6), Vec3::new(x, y, z)),
        ));
        nodes[crates_root as usize].children.push(index);
    }

    let pane = nodes.len() as u32;
    nodes.push(node(
        "pane",
        PANE_MESH,
        Mat4::from_scale_rotation_translation(Vec3::new(3.0, 2.0, 0.1), Quat::IDENTITY, Vec3::new(0.0, 1.0, -0.5)),
    ));

    let mobs_root = nodes.len() as u32;
    nodes.push(node(DYNAMIC_ROOT_NAME, NO_INDEX, Mat4::IDENTITY));
    for i in 0..MOB_COUNT {
        let index = nodes.len() as u32;
        let scale = Mat4::from_scale(Vec3::splat(0.6));
        nodes.push(node(mob_name(i), MOB_MESH, mob_transform(i, MOB_COUNT, 0.0) * scale));
        nodes[mobs_root as usize].children.push(index);
    }

    Asset {
        name: ASSET_NAME.to_string(),
        nodes,
        meshes,
        materials,
        samplers: vec![Sampler { mag_filter: Filter::Linear, min_filter: Filter::Linear }],
        images: vec![checker(CHECKER_SIZE, 8)],
        scenes: vec![AssetScene { name: "main".to_string(), nodes: vec![0, crates_root, pane, mobs_root] }],
        root_scene: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosy_engine::rosy::scene::{parse_model_id, SceneGraph};

    #[test]
    fn test_demo_asset_is_valid() {
        let asset = build();
        assert!(asset.validate().is_ok());
        assert_eq!(asset.meshes[CUBE_MESH as usize].indices.len(), 36);
        assert_eq!(asset.images[0].pixels.len(), (CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
    }

    #[test]
    fn test_mobs_are_dynamic() {
        let mut graph = SceneGraph::new();
        graph.set_asset(&build()).unwrap();
        // ground, 3 crates, pane
        assert_eq!(graph.static_count(), 5);
        assert_eq!(graph.dynamic_count(), MOB_COUNT);

        let id = parse_model_id(&format!("{}:{}:{}", ASSET_NAME, DYNAMIC_ROOT_NAME, mob_name(2))).unwrap();
        let node = graph.resolve_model_id(&id).unwrap();
        assert_eq!(graph.node(node).map(|n| n.dynamic), Some(true));
    }

    #[test]
    fn test_cube_faces_point_outward() {
        let cube = cube("cube", [1.0; 4], 0);
        for vertex in &cube.vertices {
            let position = Vec3::from(vertex.position);
            let normal = Vec3::from(vertex.normal);
            assert!((position.dot(normal) - 0.5).abs() < 1e-5);
        }
    }
}
