use glam::{
  Vec2,
  Vec3,
  Vec4,
};

use super::vertex::HalaVertexLayout;

/// The vertex produced by an external importer.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct HalaVertex {
  pub position: Vec3,
  pub normal: Vec3,
  pub tangent: Vec4,
  pub tex_coord: Vec2,
}

/// An imported triangle list, consumed to build a model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HalaPrimitive {
  pub vertices: Vec<HalaVertex>,
  pub indices: Vec<u32>,
}

/// The implementation of the primitive.
impl HalaPrimitive {
  /// Interleave the vertices in the standard layout.
  /// return: The vertex bytes.
  pub fn vertex_bytes(&self) -> Vec<u8> {
    let mut data = Vec::with_capacity(self.vertices.len() * HalaVertexLayout::standard().stride());
    for vertex in self.vertices.iter() {
      let components = vertex.position.to_array().into_iter()
        .chain(vertex.normal.to_array())
        .chain(vertex.tangent.to_array())
        .chain(vertex.tex_coord.to_array());
      for component in components {
        data.extend_from_slice(&component.to_le_bytes());
      }
    }
    data
  }

  /// Check if every index fits in 16 bits.
  pub fn fits_u16_indices(&self) -> bool {
    self.indices.iter().all(|&index| index <= u16::MAX as u32)
  }
}
