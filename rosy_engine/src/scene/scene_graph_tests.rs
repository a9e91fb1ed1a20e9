/// Tests for SceneGraph
///
/// Covers breadth-first arena construction, transform propagation, the
/// static/dynamic object partition and model id resolution.

use super::*;
use crate::error::Error;
use crate::scene::asset::Node;
use crate::scene::model_id::parse_model_id;
use crate::scene::test_assets::{mobs_asset, root_child_asset};
use glam::Vec3;

fn translation(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_root_child_scenario() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&root_child_asset()).unwrap();

    let objects = graph.process();

    assert_eq!(objects.len(), 1);
    assert_eq!(translation(&objects[0].transform), Vec3::new(2.0, 0.0, 0.0));
    assert_eq!(objects[0].surfaces.len(), 1);
    assert_eq!(objects[0].surfaces[0].index_count, 3);
    assert_eq!(objects[0].surfaces[0].material, None);
    assert_eq!(graph.static_offset(), 1);
    assert_eq!(graph.dynamic_count(), 0);
}

#[test]
fn test_arena_is_breadth_first() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();

    let names: Vec<&str> = graph.nodes().iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["world", "ground", "mobs", "tree", "mob_a", "mob_b"]);

    for (index, node) in graph.nodes().iter().enumerate() {
        if let Some(parent) = node.parent {
            assert!(parent < index);
            assert!(graph.nodes()[parent].children.contains(&index));
        }
    }
    assert_eq!(graph.roots(), &[0]);
}

#[test]
fn test_mesh_less_node_still_propagates() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();

    let mobs = graph.find_node("mobs").unwrap();
    let mob_a = graph.find_node("mob_a").unwrap();
    assert!(graph.node(mobs).unwrap().mesh_id.is_none());
    assert!(graph.node(mobs).unwrap().object_index.is_none());
    assert_eq!(
        translation(&graph.node(mob_a).unwrap().world_transform),
        Vec3::new(1.0, 1.0, 0.0)
    );
}

// ============================================================================
// Transform propagation
// ============================================================================

#[test]
fn test_child_world_is_parent_times_local() {
    let mut asset = root_child_asset();
    let parent_local = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
    asset.nodes[0].transform = parent_local;

    let mut graph = SceneGraph::new();
    graph.set_asset(&asset).unwrap();

    let child = graph.node(1).unwrap();
    assert_eq!(child.world_transform, parent_local * child.local_transform);
    assert_eq!(translation(&child.world_transform), Vec3::new(2.0, 5.0, 0.0));
}

#[test]
fn test_updated_parent_moves_children() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();
    let mobs = graph.find_node("mobs").unwrap();
    let mob_b = graph.find_node("mob_b").unwrap();

    graph
        .set_local_transform(mobs, Mat4::from_translation(Vec3::new(0.0, 0.0, 7.0)))
        .unwrap();
    graph.update_transforms();

    assert_eq!(translation(&graph.node(mob_b).unwrap().world_transform), Vec3::new(0.0, 0.0, 7.0));
}

#[test]
fn test_parents_visited_before_children() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();
    graph.update_transforms();

    let order = graph.propagation_order();
    assert_eq!(order.len(), graph.nodes().len());
    let position = |node: usize| order.iter().position(|&n| n == node).unwrap();
    for (index, node) in graph.nodes().iter().enumerate() {
        if let Some(parent) = node.parent {
            assert!(position(parent) < position(index));
        }
    }
}

#[test]
fn test_set_local_transform_out_of_range() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&root_child_asset()).unwrap();
    assert!(matches!(graph.set_local_transform(9, Mat4::IDENTITY), Err(Error::InvalidResource(_))));
}

// ============================================================================
// Static / dynamic partition
// ============================================================================

#[test]
fn test_static_objects_precede_dynamic_objects() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();
    let objects = graph.process();

    assert_eq!(graph.static_count(), 2);
    assert_eq!(graph.dynamic_count(), 2);
    assert_eq!(graph.static_offset(), 2);
    assert_eq!(graph.dynamic_range(), 2..4);

    for object in &objects[graph.static_range()] {
        assert!(!object.is_dynamic());
    }
    for object in &objects[graph.dynamic_range()] {
        assert!(object.is_dynamic());
        assert!(graph.nodes()[object.node].dynamic);
    }
    let dynamic_names: Vec<&str> = objects[graph.dynamic_range()]
        .iter()
        .map(|o| graph.nodes()[o.node].name.as_str())
        .collect();
    assert_eq!(dynamic_names, vec!["mob_a", "mob_b"]);
}

#[test]
fn test_object_index_matches_buffer_position() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();

    let mut buffer = Vec::new();
    graph.populate_graph(&mut buffer);

    assert_eq!(buffer.len(), graph.object_count());
    for (position, object) in buffer.iter().enumerate() {
        assert_eq!(object.index, position);
        assert_eq!(graph.nodes()[object.node].object_index, Some(position));
    }
}

#[test]
fn test_populate_shrinks_oversized_buffer() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&root_child_asset()).unwrap();

    let mut buffer = vec![GraphicsObject::default(); 10];
    graph.populate_graph(&mut buffer);

    assert_eq!(buffer.len(), 1);
}

// ============================================================================
// Malformed input
// ============================================================================

#[test]
fn test_invalid_asset_leaves_graph_empty() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();

    let mut broken = mobs_asset();
    broken.nodes[2].children.push(42);
    let result = graph.set_asset(&broken);

    assert!(matches!(result, Err(Error::MalformedAsset(_))));
    assert!(graph.is_empty());
    assert_eq!(graph.object_count(), 0);
}

#[test]
fn test_shared_child_rejected() {
    let mut asset = mobs_asset();
    // tree also claims mob_a
    asset.nodes[5].children.push(2);

    let mut graph = SceneGraph::new();
    let result = graph.set_asset(&asset);

    assert!(matches!(result, Err(Error::MalformedAsset(msg)) if msg.contains("more than once")));
    assert!(graph.is_empty());
}

#[test]
fn test_cycle_rejected() {
    let mut asset = root_child_asset();
    asset.nodes[1].children.push(0);

    let mut graph = SceneGraph::new();
    assert!(graph.set_asset(&asset).is_err());
}

#[test]
fn test_multiple_roots() {
    let mut asset = root_child_asset();
    let mut second = Node::new("second_root");
    second.mesh_id = 0;
    asset.nodes.push(second);
    asset.scenes[0].nodes.push(2);

    let mut graph = SceneGraph::new();
    graph.set_asset(&asset).unwrap();

    assert_eq!(graph.roots().len(), 2);
    assert_eq!(graph.object_count(), 2);
}

// ============================================================================
// Model ids
// ============================================================================

#[test]
fn test_resolve_model_id() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();

    let id = parse_model_id("assets/level.rsy:world:mobs:mob_b").unwrap();
    let node = graph.resolve_model_id(&id).unwrap();

    assert_eq!(graph.node(node).unwrap().name, "mob_b");
}

#[test]
fn test_resolve_model_id_errors() {
    let mut graph = SceneGraph::new();
    graph.set_asset(&mobs_asset()).unwrap();

    for bad in [
        "assets/other.rsy:world",
        "assets/level.rsy",
        "assets/level.rsy:mobs",
        "assets/level.rsy:world:mobs:mob_c",
    ] {
        let id = parse_model_id(bad).unwrap();
        assert!(
            matches!(graph.resolve_model_id(&id), Err(Error::MalformedAsset(_))),
            "'{}' should not resolve",
            bad
        );
    }
}
