/// Small assets shared by the scene unit tests.

use glam::{Mat4, Vec3};
use super::asset::*;

pub fn triangle_mesh(name: &str) -> Mesh {
    Mesh {
        name: name.to_string(),
        vertices: vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0], [1.0; 4]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0], [1.0; 4]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0], [1.0; 4]),
        ],
        indices: vec![0, 1, 2],
        surfaces: vec![Surface { start_index: 0, count: 3, material: NO_INDEX }],
    }
}

fn single_scene(roots: Vec<u32>) -> Vec<AssetScene> {
    vec![AssetScene { name: "main".to_string(), nodes: roots }]
}

/// root (identity) -> child at (2, 0, 0) carrying a 3-index mesh
pub fn root_child_asset() -> Asset {
    let mut root = Node::new("root");
    root.children = vec![1];
    let mut child = Node::new("child");
    child.transform = Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0));
    child.mesh_id = 0;

    Asset {
        name: "assets/root_child.rsy".to_string(),
        nodes: vec![root, child],
        meshes: vec![triangle_mesh("tri")],
        scenes: single_scene(vec![0]),
        ..Default::default()
    }
}

/// world -> [ground, mobs -> [mob_a, mob_b], tree]
///
/// Asset node order deliberately differs from breadth-first order.
pub fn mobs_asset() -> Asset {
    let mut world = Node::new("world");
    world.children = vec![4, 1, 5];

    let mut mobs = Node::new("mobs");
    mobs.transform = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
    mobs.children = vec![2, 3];

    let mut mob_a = Node::new("mob_a");
    mob_a.mesh_id = 0;
    mob_a.transform = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
    let mut mob_b = Node::new("mob_b");
    mob_b.mesh_id = 0;

    let mut ground = Node::new("ground");
    ground.mesh_id = 0;
    let mut tree = Node::new("tree");
    tree.mesh_id = 0;
    tree.transform = Mat4::from_translation(Vec3::new(-3.0, 0.0, 0.0));

    Asset {
        name: "assets/level.rsy".to_string(),
        nodes: vec![world, mobs, mob_a, mob_b, ground, tree],
        meshes: vec![triangle_mesh("tri")],
        scenes: single_scene(vec![0]),
        ..Default::default()
    }
}
