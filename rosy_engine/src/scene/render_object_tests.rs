//! Unit tests for render_object.rs

use std::sync::Arc;
use super::*;
use crate::scene::graphics_object::SurfaceDraw;

fn object(index: usize, mesh_id: u32, materials: &[Option<u32>]) -> GraphicsObject {
    let surfaces: Vec<SurfaceDraw> = materials
        .iter()
        .enumerate()
        .map(|(i, &material)| SurfaceDraw { first_index: i as u32 * 3, index_count: 3, material })
        .collect();
    GraphicsObject {
        index,
        mesh_id,
        surfaces: Arc::from(surfaces),
        ..Default::default()
    }
}

fn meshes() -> Vec<MeshBinding> {
    vec![
        MeshBinding { index_buffer: 0x30, vertex_buffer_address: 0x1000 },
        MeshBinding { index_buffer: 0x10, vertex_buffer_address: 0x2000 },
    ]
}

const ADDRESSES: SceneAddresses = SceneAddresses {
    scene_buffer: 0xA000,
    material_buffer: 0xB000,
    render_data: 0xC000,
};

#[test]
fn test_one_draw_per_surface() {
    let objects = vec![object(0, 0, &[None, None])];
    let mut out = Vec::new();
    build_render_objects(&objects, &meshes(), &[], ADDRESSES, &mut out);

    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|r| r.index_count == 3 && r.material_index == DEFAULT_MATERIAL_SLOT));
    assert_eq!(out[0].scene_buffer_address, 0xA000);
    assert_eq!(out[0].vertex_buffer_address, 0x1000);
}

#[test]
fn test_render_data_offset_follows_object_index() {
    let objects = vec![object(3, 0, &[None])];
    let mut out = Vec::new();
    build_render_objects(&objects, &meshes(), &[], ADDRESSES, &mut out);

    assert_eq!(out[0].object_index, 3);
    assert_eq!(out[0].render_data_offset, 3 * GpuObjectData::SIZE);
    assert_eq!(GpuObjectData::SIZE, 128);
}

#[test]
fn test_opaque_before_blended_grouped_by_index_buffer() {
    // material 1 blends, material 0 does not
    let blended = [false, true];
    let objects = vec![
        object(0, 0, &[Some(1)]),
        object(1, 1, &[Some(0)]),
        object(2, 0, &[Some(0)]),
        object(3, 1, &[Some(1)]),
        object(4, 0, &[None]),
    ];
    let mut out = Vec::new();
    build_render_objects(&objects, &meshes(), &blended, ADDRESSES, &mut out);

    let split = first_blended(&out);
    assert_eq!(split, 3);
    assert!(out[..split].iter().all(|r| !r.blended));
    assert!(out[split..].iter().all(|r| r.blended));

    for part in [&out[..split], &out[split..]] {
        let buffers: Vec<u64> = part.iter().map(|r| r.index_buffer).collect();
        let mut grouped = buffers.clone();
        grouped.dedup();
        let mut distinct = grouped.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(grouped.len(), distinct.len());
    }
}

#[test]
fn test_materials_grouped_within_index_buffer() {
    let objects = vec![
        object(0, 0, &[Some(2), Some(0)]),
        object(1, 0, &[Some(0), Some(2)]),
        object(2, 0, &[Some(2)]),
    ];
    let mut out = Vec::new();
    build_render_objects(&objects, &meshes(), &[false, false, false], ADDRESSES, &mut out);

    let materials: Vec<u32> = out.iter().map(|r| r.material_index).collect();
    assert_eq!(materials, vec![1, 1, 3, 3, 3]);
    assert!(out.iter().all(|r| r.index_buffer == 0x30));
}

#[test]
fn test_meshes_without_index_buffer_skipped() {
    // mesh 0 was empty at upload, so the first blended object has no buffer
    let meshes = vec![
        MeshBinding::default(),
        MeshBinding { index_buffer: 0x10, vertex_buffer_address: 0x2000 },
    ];
    let blended = [true];
    let objects = vec![object(0, 0, &[Some(0)]), object(1, 1, &[Some(0)]), object(2, 1, &[None])];
    let mut out = Vec::new();
    build_render_objects(&objects, &meshes, &blended, ADDRESSES, &mut out);

    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|r| r.index_buffer != 0));
    let split = first_blended(&out);
    assert_eq!(split, 1);
    assert_eq!(out[split].object_index, 1);
    assert!(out[split].blended);
}

#[test]
fn test_material_slots_are_shifted_by_default() {
    let objects = vec![object(0, 0, &[Some(0), Some(4)])];
    let mut out = Vec::new();
    build_render_objects(&objects, &meshes(), &[false], ADDRESSES, &mut out);

    let mut slots: Vec<u32> = out.iter().map(|r| r.material_index).collect();
    slots.sort();
    assert_eq!(slots, vec![1, 5]);
    assert!(out.iter().all(|r| !r.blended));
}

#[test]
fn test_hidden_and_unbound_objects_skipped() {
    let mut hidden = object(0, 0, &[None]);
    hidden.flags.remove(GraphicsObjectFlags::VISIBLE);
    let objects = vec![hidden, object(1, 9, &[None]), object(2, 1, &[None])];

    let mut out = vec![RenderObject::default(); 4];
    build_render_objects(&objects, &meshes(), &[], ADDRESSES, &mut out);

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].object_index, 2);
}

#[test]
fn test_sort_key_puts_blend_bit_on_top() {
    let opaque = RenderObject { mesh_id: u32::MAX, material_index: u32::MAX, ..Default::default() };
    let blended = RenderObject { blended: true, ..Default::default() };
    assert!(opaque.sort_key() < blended.sort_key());

    let low_mesh = RenderObject { mesh_id: 1, material_index: u32::MAX, ..Default::default() };
    let high_mesh = RenderObject { mesh_id: 2, ..Default::default() };
    assert!(low_mesh.sort_key() < high_mesh.sort_key());
}
