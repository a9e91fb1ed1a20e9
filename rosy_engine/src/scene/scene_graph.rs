/// SceneGraph - arena of nodes with breadth-first transform propagation.
///
/// Nodes are addressed by arena index. The arena is filled breadth-first, so
/// a child's index is always greater than its parent's. Every node that
/// carries a mesh yields one graphics object with a stable object index:
/// static objects take `[0, S)`, objects under the `mobs` node take
/// `[S, S + D)`. `S` is the dynamic offset used when only the dynamic part of
/// the object buffer is re-uploaded.

use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;
use glam::Mat4;
use rustc_hash::{FxHashMap, FxHashSet};
use crate::engine_bail;
use crate::engine_debug;
use crate::error::Result;
use super::asset::{Asset, NO_INDEX};
use super::graphics_object::{GraphicsObject, GraphicsObjectFlags, SurfaceDraw};
use super::model_id::ModelId;

/// Name of the node whose descendants are dynamic
pub const DYNAMIC_ROOT_NAME: &str = "mobs";

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub local_transform: Mat4,
    pub world_transform: Mat4,
    pub mesh_id: Option<u32>,
    /// Object buffer slot, for nodes carrying a mesh
    pub object_index: Option<usize>,
    pub dynamic: bool,
}

#[derive(Default)]
pub struct SceneGraph {
    asset_path: String,
    nodes: Vec<GraphNode>,
    roots: Vec<usize>,
    /// Resolved surfaces, one entry per asset mesh
    mesh_surfaces: Vec<Arc<[SurfaceDraw]>>,
    static_count: usize,
    dynamic_count: usize,
    /// Order of the last propagation, reused between frames
    propagation_order: Vec<usize>,
    queue: VecDeque<usize>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node; the graph is empty afterwards
    pub fn clear(&mut self) {
        self.asset_path.clear();
        self.nodes.clear();
        self.roots.clear();
        self.mesh_surfaces.clear();
        self.static_count = 0;
        self.dynamic_count = 0;
        self.propagation_order.clear();
        self.queue.clear();
    }

    /// Rebuild the graph from `asset`
    ///
    /// On error the graph is left empty.
    ///
    /// # Errors
    ///
    /// `Error::MalformedAsset` if the asset fails validation or a node is
    /// reachable more than once.
    pub fn set_asset(&mut self, asset: &Asset) -> Result<()> {
        self.clear();
        if let Err(err) = self.build(asset) {
            self.clear();
            return Err(err);
        }
        self.update_transforms();
        engine_debug!(
            "rosy::scene",
            "Scene graph built from '{}': {} nodes, {} static / {} dynamic objects",
            asset.name,
            self.nodes.len(),
            self.static_count,
            self.dynamic_count
        );
        Ok(())
    }

    fn build(&mut self, asset: &Asset) -> Result<()> {
        asset.validate()?;
        self.asset_path = asset.name.clone();

        self.mesh_surfaces = asset
            .meshes
            .iter()
            .map(|mesh| {
                let surfaces: Arc<[SurfaceDraw]> = mesh
                    .surfaces
                    .iter()
                    .map(|s| SurfaceDraw {
                        first_index: s.start_index,
                        index_count: s.count,
                        material: (s.material != NO_INDEX).then_some(s.material),
                    })
                    .collect::<Vec<_>>()
                    .into();
                surfaces
            })
            .collect();

        // (asset node, parent arena index, dynamic)
        let mut queue: VecDeque<(u32, Option<usize>, bool)> = asset
            .root_nodes()
            .iter()
            .map(|&n| (n, None, false))
            .collect();
        let mut visited: FxHashSet<u32> = FxHashSet::default();

        while let Some((asset_index, parent, dynamic)) = queue.pop_front() {
            if !visited.insert(asset_index) {
                engine_bail!("rosy::scene", MalformedAsset =>
                    "node {} is reachable more than once", asset_index);
            }
            let source = &asset.nodes[asset_index as usize];
            let index = self.nodes.len();

            self.nodes.push(GraphNode {
                name: source.name.clone(),
                parent,
                children: Vec::with_capacity(source.children.len()),
                local_transform: source.transform,
                world_transform: source.transform,
                mesh_id: (source.mesh_id != NO_INDEX).then_some(source.mesh_id),
                object_index: None,
                dynamic,
            });
            match parent {
                Some(parent) => self.nodes[parent].children.push(index),
                None => self.roots.push(index),
            }

            let children_dynamic = dynamic || source.name == DYNAMIC_ROOT_NAME;
            for &child in &source.children {
                queue.push_back((child, Some(index), children_dynamic));
            }
        }

        self.assign_object_indices();
        Ok(())
    }

    /// Static objects first in arena order, then dynamic ones
    fn assign_object_indices(&mut self) {
        let mut next = 0;
        for node in self.nodes.iter_mut().filter(|n| n.mesh_id.is_some() && !n.dynamic) {
            node.object_index = Some(next);
            next += 1;
        }
        self.static_count = next;
        for node in self.nodes.iter_mut().filter(|n| n.mesh_id.is_some() && n.dynamic) {
            node.object_index = Some(next);
            next += 1;
        }
        self.dynamic_count = next - self.static_count;
    }

    /// Recompute world transforms root to leaf, breadth-first
    pub fn update_transforms(&mut self) {
        self.propagation_order.clear();
        self.queue.clear();
        self.queue.extend(self.roots.iter().copied());

        while let Some(index) = self.queue.pop_front() {
            let world = match self.nodes[index].parent {
                Some(parent) => self.nodes[parent].world_transform * self.nodes[index].local_transform,
                None => self.nodes[index].local_transform,
            };
            let node = &mut self.nodes[index];
            node.world_transform = world;
            self.queue.extend(node.children.iter().copied());
            self.propagation_order.push(index);
        }
    }

    /// Write every graphics object into `buffer` at its object index
    ///
    /// `buffer` is resized to `object_count()`.
    pub fn populate_graph(&self, buffer: &mut Vec<GraphicsObject>) {
        buffer.resize_with(self.object_count(), GraphicsObject::default);

        for &index in &self.propagation_order {
            let node = &self.nodes[index];
            let (Some(object_index), Some(mesh_id)) = (node.object_index, node.mesh_id) else {
                continue;
            };
            let mut flags = GraphicsObjectFlags::default();
            if node.dynamic {
                flags |= GraphicsObjectFlags::DYNAMIC;
            }
            buffer[object_index] = GraphicsObject {
                index: object_index,
                node: index,
                mesh_id,
                transform: node.world_transform,
                surfaces: Arc::clone(&self.mesh_surfaces[mesh_id as usize]),
                flags,
            };
        }
    }

    /// Propagate transforms and collect the graphics objects
    pub fn process(&mut self) -> Vec<GraphicsObject> {
        self.update_transforms();
        let mut objects = Vec::with_capacity(self.object_count());
        self.populate_graph(&mut objects);
        objects
    }

    pub fn set_local_transform(&mut self, node: usize, transform: Mat4) -> Result<()> {
        match self.nodes.get_mut(node) {
            Some(node) => {
                node.local_transform = transform;
                Ok(())
            }
            None => engine_bail!("rosy::scene", InvalidResource =>
                "node {} out of range ({} nodes)", node, self.nodes.len()),
        }
    }

    /// First node named `name` in breadth-first order
    pub fn find_node(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Resolve a level-editor model id to a node index
    ///
    /// # Errors
    ///
    /// `Error::MalformedAsset` if the id names another asset, no node, or a
    /// path segment matches no child.
    pub fn resolve_model_id(&self, id: &ModelId) -> Result<usize> {
        if id.asset_path != self.asset_path {
            engine_bail!("rosy::scene", MalformedAsset =>
                "model id '{}' does not belong to asset '{}'", id, self.asset_path);
        }
        let Some((first, rest)) = id.node_path.split_first() else {
            engine_bail!("rosy::scene", MalformedAsset => "model id '{}' names no node", id);
        };

        let names: FxHashMap<&str, usize> =
            self.roots.iter().map(|&r| (self.nodes[r].name.as_str(), r)).collect();
        let Some(&start) = names.get(first.as_str()) else {
            engine_bail!("rosy::scene", MalformedAsset => "model id '{}': no root named '{}'", id, first);
        };

        let mut current = start;
        for segment in rest {
            let next = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c].name == *segment);
            match next {
                Some(child) => current = child,
                None => engine_bail!("rosy::scene", MalformedAsset =>
                    "model id '{}': '{}' has no child named '{}'", id, self.nodes[current].name, segment),
            }
        }
        Ok(current)
    }

    pub fn node(&self, index: usize) -> Option<&GraphNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Node visit order of the last propagation
    pub fn propagation_order(&self) -> &[usize] {
        &self.propagation_order
    }

    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    /// Number of static objects, which is also the first dynamic index
    pub fn static_offset(&self) -> usize {
        self.static_count
    }

    pub fn static_count(&self) -> usize {
        self.static_count
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic_count
    }

    pub fn object_count(&self) -> usize {
        self.static_count + self.dynamic_count
    }

    pub fn static_range(&self) -> Range<usize> {
        0..self.static_count
    }

    pub fn dynamic_range(&self) -> Range<usize> {
        self.static_count..self.object_count()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[path = "scene_graph_tests.rs"]
mod tests;
