//! Shared builders for the model integration tests.

#![allow(dead_code)]

use glam::{
  Affine3A,
  Quat,
  Vec3,
};

use hala_model::prelude::*;

/// Little-endian byte stream builder for hand made model files.
#[derive(Default)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
  pub fn id(mut self, id: &[u8; 4]) -> Self {
    self.0.extend_from_slice(id);
    self
  }

  pub fn u8(mut self, value: u8) -> Self {
    self.0.push(value);
    self
  }

  pub fn u32(mut self, value: u32) -> Self {
    self.0.extend_from_slice(&value.to_le_bytes());
    self
  }

  pub fn f32(mut self, value: f32) -> Self {
    self.0.extend_from_slice(&value.to_le_bytes());
    self
  }

  pub fn f32s(self, values: &[f32]) -> Self {
    values.iter().fold(self, |bytes, &value| bytes.f32(value))
  }

  pub fn string(mut self, value: &str) -> Self {
    self = self.u32(value.len() as u32);
    self.0.extend_from_slice(value.as_bytes());
    self
  }

  pub fn raw(mut self, data: &[u8]) -> Self {
    self.0.extend_from_slice(data);
    self
  }
}

/// The knobs of a one triangle model file.
pub struct TriangleFile {
  pub legacy: bool,
  pub vertex_buffer_ref: u32,
  pub lod_distances: Vec<f32>,
  pub bone_mapping: Vec<u32>,
  pub num_bones: u32,
  pub morph_vertex: Option<u32>,
  pub with_center: bool,
}

impl Default for TriangleFile {
  fn default() -> Self {
    Self {
      legacy: false,
      vertex_buffer_ref: 0,
      lod_distances: vec![0.0],
      bone_mapping: Vec::new(),
      num_bones: 0,
      morph_vertex: None,
      with_center: true,
    }
  }
}

impl TriangleFile {
  /// Encode a file holding one position-only vertex buffer of three vertices,
  /// one 16-bit index buffer and one geometry.
  pub fn bytes(&self) -> Vec<u8> {
    let mut bytes = Bytes::default()
      .id(if self.legacy { b"UMDL" } else { b"UMD2" })
      .u32(1)
      .u32(3);
    bytes = if self.legacy {
      bytes.u32(0x1)
    } else {
      bytes.u32(1).u32(HalaVertexElementType::Float3 as u32)
    };
    bytes = bytes
      .u32(0)
      .u32(0)
      .f32s(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
      .u32(1)
      .u32(3)
      .u32(2)
      .raw(&[0, 0, 1, 0, 2, 0])
      .u32(1)
      .u32(self.bone_mapping.len() as u32);
    for &bone in self.bone_mapping.iter() {
      bytes = bytes.u32(bone);
    }
    bytes = bytes.u32(self.lod_distances.len() as u32);
    for &distance in self.lod_distances.iter() {
      bytes = bytes
        .f32(distance)
        .u32(0)
        .u32(self.vertex_buffer_ref)
        .u32(0)
        .u32(0)
        .u32(3);
    }
    match self.morph_vertex {
      Some(vertex) => {
        bytes = bytes
          .u32(1)
          .string("bulge")
          .u32(1)
          .u32(0)
          .u32(0x1)
          .u32(1)
          .u32(vertex)
          .f32s(&[0.0, 0.0, 1.0]);
      },
      None => bytes = bytes.u32(0),
    }
    bytes = bytes.u32(self.num_bones);
    for index in 0..self.num_bones {
      bytes = bytes
        .string(&format!("bone{}", index))
        .u32(0)
        .f32s(&[0.0, 0.0, 0.0])
        .f32s(&[1.0, 0.0, 0.0, 0.0])
        .f32s(&[1.0, 1.0, 1.0])
        .f32s(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0])
        .u8(0);
    }
    bytes = bytes.f32s(&[0.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
    if self.with_center {
      bytes = bytes.f32s(&[0.25, 0.25, 0.0]);
    }
    bytes.0
  }
}

fn vertex_bytes(count: u32, stride: usize, seed: u8) -> Vec<u8> {
  (0..count as usize * stride).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

/// A skinned, morphed model with a shared vertex buffer:
/// geometries 0 and 1 both draw from vertex buffer 0, geometry 2 draws from vertex buffer 1.
pub fn sample_model(config: HalaModelConfig) -> HalaModel {
  let standard = HalaVertexLayout::standard();
  let mut shared = HalaVertexBuffer::new(10, standard.clone(), vertex_bytes(10, standard.stride(), 1))
    .expect("vertex buffer 0");
  shared.set_morph_range(5, 1);
  let lines_layout = HalaVertexLayout::from_legacy_mask(0x3);
  let lines = HalaVertexBuffer::new(4, lines_layout.clone(), vertex_bytes(4, lines_layout.stride(), 3))
    .expect("vertex buffer 1");

  let mut model = HalaModel::with_config("sample", config);
  model.set_vertex_buffers(vec![shared, lines]).expect("vertex buffers");
  model.set_index_buffers(vec![
    HalaIndexBuffer::from_u16(&[0, 1, 2, 3, 4, 5]),
    HalaIndexBuffer::from_u32(&[0, 1, 2, 3]),
  ]).expect("index buffers");

  model.set_num_geometries(3).expect("geometries");
  model.set_num_geometry_lod_levels(0, 2).expect("lod levels");
  let level = |distance: f32, vertex_buffer: u32, index_buffer: u32, index_start: u32, index_count: u32, topology: HalaPrimitiveTopology| HalaLodLevel {
    distance,
    topology,
    vertex_buffer: HalaVertexBufferHandle(vertex_buffer),
    index_buffer: HalaIndexBufferHandle(index_buffer),
    index_start,
    index_count,
  };
  model.set_geometry(0, 0, level(0.0, 0, 0, 0, 6, HalaPrimitiveTopology::TriangleList)).expect("geometry 0");
  model.set_geometry(0, 1, level(20.0, 0, 0, 0, 3, HalaPrimitiveTopology::TriangleList)).expect("geometry 0 lod 1");
  model.set_geometry(1, 0, level(0.0, 0, 0, 3, 3, HalaPrimitiveTopology::TriangleList)).expect("geometry 1");
  model.set_geometry(2, 0, level(0.0, 1, 1, 0, 4, HalaPrimitiveTopology::LineList)).expect("geometry 2");
  for (index, center) in [Vec3::ZERO, Vec3::X, Vec3::new(0.0, 2.0, 0.0)].into_iter().enumerate() {
    model.set_geometry_center(index, center).expect("center");
  }

  let skeleton = HalaSkeleton::new(vec![
    HalaBone {
      name: "root".to_owned(),
      collision_mask: 0x3,
      radius: 0.5,
      bounding_box: HalaBoundingBox::new(Vec3::splat(-0.5), Vec3::splat(0.5)),
      ..Default::default()
    },
    HalaBone {
      name: "jaw".to_owned(),
      parent: Some(0),
      initial_position: Vec3::new(0.0, 1.5, 0.0),
      initial_rotation: Quat::from_rotation_x(0.25),
      offset_matrix: Affine3A::from_translation(Vec3::new(0.0, -1.5, 0.0)),
      collision_mask: 0x1,
      radius: 0.1,
      ..Default::default()
    },
  ]).expect("skeleton");
  model.set_skeleton(skeleton).expect("set skeleton");
  model.set_geometry_bone_mappings(vec![vec![1, 0], vec![0]]).expect("bone mappings");

  let mut smile = HalaModelMorph::new("smile");
  smile.buffers.insert(0, HalaVertexBufferMorph::new(0x1 | 0x2, vec![HalaMorphDelta {
    vertex_index: 5,
    position: Vec3::new(0.0, 1.0, 0.0),
    normal: Vec3::new(0.0, 0.0, 0.5),
    ..Default::default()
  }]));
  smile.buffers.insert(1, HalaVertexBufferMorph::new(0x1, vec![HalaMorphDelta {
    vertex_index: 3,
    position: Vec3::new(2.0, 0.0, 0.0),
    ..Default::default()
  }]));
  model.set_morphs(vec![smile]).expect("morphs");

  model.set_bounding_box(HalaBoundingBox::new(Vec3::splat(-1.0), Vec3::splat(2.0))).expect("bounding box");
  model
}

/// Read the f32 at a byte offset.
pub fn f32_at(data: &[u8], offset: usize) -> f32 {
  f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

/// Route the crate logs to the test output.
pub fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}
