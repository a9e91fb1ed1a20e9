//! Scene data: the asset model, the scene graph and per-frame draw data

mod asset;
mod camera;
mod graphics_object;
mod model_id;
mod render_object;
mod scene_graph;
mod shadow_cascades;

#[cfg(test)]
mod test_assets;

pub use asset::{
    AlphaMode, Asset, AssetScene, Filter, Image, Material, Mesh, Node, Sampler, Surface, Vertex,
    NO_INDEX,
};
pub use camera::Camera;
pub use graphics_object::{GpuObjectData, GraphicsObject, GraphicsObjectFlags, SurfaceDraw};
pub use model_id::{parse_model_id, ModelId, MODEL_ID_DELIMITER};
pub use render_object::{
    build_render_objects, first_blended, MeshBinding, RenderObject, SceneAddresses,
    DEFAULT_MATERIAL_SLOT,
};
pub use scene_graph::{GraphNode, SceneGraph, DYNAMIC_ROOT_NAME};
pub use shadow_cascades::{
    bounding_sphere, cascade_splits, fit_sphere, frustum_slice_corners, ShadowCascades,
    DEFAULT_SPLIT_LAMBDA,
};
