use std::collections::BTreeMap;

use glam::Vec3;

use crate::error::HalaModelError;
use super::buffer::HalaVertexBuffer;
use super::vertex::{
  HalaVertexLayout,
  HalaVertexElementSemantic,
};

/// Morph element mask bits.
pub const MORPH_MASK_POSITION: u32 = 0x1;
pub const MORPH_MASK_NORMAL: u32 = 0x2;
pub const MORPH_MASK_TANGENT: u32 = 0x80;

/// The offset added to one vertex by a morph at full weight.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct HalaMorphDelta {
  pub vertex_index: u32,
  pub position: Vec3,
  pub normal: Vec3,
  pub tangent: Vec3,
}

/// The sparse deltas a morph applies to one vertex buffer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HalaVertexBufferMorph {
  pub element_mask: u32,
  pub deltas: Vec<HalaMorphDelta>,
}

/// The implementation of the vertex buffer morph.
impl HalaVertexBufferMorph {
  /// Create a new vertex buffer morph.
  /// param element_mask: Which of position, normal and tangent the deltas perturb.
  /// param deltas: The deltas of the vertices that move.
  /// return: The vertex buffer morph.
  pub fn new(element_mask: u32, deltas: Vec<HalaMorphDelta>) -> Self {
    Self { element_mask, deltas }
  }

  /// Get the size of one encoded delta record.
  /// param element_mask: The element mask.
  /// return: The size in bytes.
  pub fn record_size(element_mask: u32) -> usize {
    let mut size = std::mem::size_of::<u32>();
    for bit in [MORPH_MASK_POSITION, MORPH_MASK_NORMAL, MORPH_MASK_TANGENT] {
      if element_mask & bit != 0 {
        size += 3 * std::mem::size_of::<f32>();
      }
    }
    size
  }

  pub fn vertex_count(&self) -> u32 {
    self.deltas.len() as u32
  }

  /// Get the encoded size of the deltas.
  /// return: The size in bytes.
  pub fn data_size(&self) -> usize {
    self.deltas.len() * Self::record_size(self.element_mask)
  }

  /// Decode the delta records.
  /// param element_mask: The element mask.
  /// param data: The records, a whole number of record_size bytes.
  /// return: The vertex buffer morph.
  pub fn decode(element_mask: u32, data: &[u8]) -> Self {
    let record_size = Self::record_size(element_mask);
    let deltas = data.chunks_exact(record_size)
      .map(|record| {
        let mut delta = HalaMorphDelta {
          vertex_index: u32::from_le_bytes([record[0], record[1], record[2], record[3]]),
          ..Default::default()
        };
        let mut offset = 4;
        if element_mask & MORPH_MASK_POSITION != 0 {
          delta.position = read_vec3(record, offset);
          offset += 12;
        }
        if element_mask & MORPH_MASK_NORMAL != 0 {
          delta.normal = read_vec3(record, offset);
          offset += 12;
        }
        if element_mask & MORPH_MASK_TANGENT != 0 {
          delta.tangent = read_vec3(record, offset);
        }
        delta
      })
      .collect();
    Self { element_mask, deltas }
  }

  /// Encode the delta records.
  /// return: The records.
  pub fn encode(&self) -> Vec<u8> {
    let mut data = Vec::with_capacity(self.data_size());
    for delta in self.deltas.iter() {
      data.extend_from_slice(&delta.vertex_index.to_le_bytes());
      if self.element_mask & MORPH_MASK_POSITION != 0 {
        push_vec3(&mut data, delta.position);
      }
      if self.element_mask & MORPH_MASK_NORMAL != 0 {
        push_vec3(&mut data, delta.normal);
      }
      if self.element_mask & MORPH_MASK_TANGENT != 0 {
        push_vec3(&mut data, delta.tangent);
      }
    }
    data
  }

  /// Add weight * delta to the listed vertices. Other vertices are left untouched.
  /// The element offsets come from the layout; elements it lacks are skipped.
  /// param layout: The layout of the vertex data.
  /// param vertex_data: The interleaved vertex bytes.
  /// param weight: The morph weight.
  pub fn apply(&self, layout: &HalaVertexLayout, vertex_data: &mut [u8], weight: f32) {
    let stride = layout.stride();
    if stride == 0 || weight == 0.0 {
      return;
    }
    let targets = [
      (MORPH_MASK_POSITION, HalaVertexElementSemantic::Position),
      (MORPH_MASK_NORMAL, HalaVertexElementSemantic::Normal),
      (MORPH_MASK_TANGENT, HalaVertexElementSemantic::Tangent),
    ];
    for (bit, semantic) in targets {
      if self.element_mask & bit == 0 {
        continue;
      }
      let offset = match (layout.element(semantic, 0), layout.element_offset(semantic, 0)) {
        (Some(element), Some(offset)) if element.element_type.float_components() >= 3 => offset,
        _ => continue,
      };
      for delta in self.deltas.iter() {
        let start = delta.vertex_index as usize * stride + offset;
        if start + 12 > vertex_data.len() {
          continue;
        }
        let value = match bit {
          MORPH_MASK_POSITION => delta.position,
          MORPH_MASK_NORMAL => delta.normal,
          _ => delta.tangent,
        };
        let current = read_vec3(vertex_data, start);
        write_vec3(vertex_data, start, current + value * weight);
      }
    }
  }
}

/// A named morph target.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HalaModelMorph {
  pub name: String,
  /// The deltas keyed by the index of the vertex buffer they affect.
  pub buffers: BTreeMap<u32, HalaVertexBufferMorph>,
}

/// The implementation of the model morph.
impl HalaModelMorph {
  /// Create a new morph without deltas.
  /// param name: The name.
  /// return: The morph.
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_owned(),
      buffers: BTreeMap::new(),
    }
  }

  /// Get the encoded size of all deltas.
  /// return: The size in bytes.
  pub fn data_size(&self) -> usize {
    self.buffers.values().map(|buffer| buffer.data_size()).sum()
  }

  /// Check every affected buffer exists and every vertex index is inside its buffer.
  /// param vertex_buffers: The vertex buffers of the model.
  /// return: The result.
  pub fn validate(&self, vertex_buffers: &[HalaVertexBuffer]) -> Result<(), HalaModelError> {
    for (&buffer_index, buffer_morph) in self.buffers.iter() {
      let vertex_count = vertex_buffers.get(buffer_index as usize)
        .map(|buffer| buffer.vertex_count())
        .ok_or(HalaModelError::MorphBufferOutOfRange {
          morph: self.name.clone(),
          buffer: buffer_index,
          count: vertex_buffers.len() as u32,
        })?;
      if let Some(delta) = buffer_morph.deltas.iter().find(|delta| delta.vertex_index >= vertex_count) {
        return Err(HalaModelError::MorphIndexOutOfRange {
          morph: self.name.clone(),
          buffer: buffer_index,
          vertex: delta.vertex_index,
          count: vertex_count,
        });
      }
    }
    Ok(())
  }

  /// Add the weighted deltas of this morph to the vertex data of a buffer.
  /// param buffer_index: The index of the vertex buffer the data belongs to.
  /// param layout: The layout of the vertex data.
  /// param vertex_data: The interleaved vertex bytes.
  /// param weight: The morph weight.
  pub fn apply(&self, buffer_index: u32, layout: &HalaVertexLayout, vertex_data: &mut [u8], weight: f32) {
    if let Some(buffer_morph) = self.buffers.get(&buffer_index) {
      buffer_morph.apply(layout, vertex_data, weight);
    }
  }
}

fn read_vec3(data: &[u8], offset: usize) -> Vec3 {
  let component = |i: usize| {
    let start = offset + i * 4;
    f32::from_le_bytes([data[start], data[start + 1], data[start + 2], data[start + 3]])
  };
  Vec3::new(component(0), component(1), component(2))
}

fn write_vec3(data: &mut [u8], offset: usize, value: Vec3) {
  for (i, component) in value.to_array().iter().enumerate() {
    let start = offset + i * 4;
    data[start..start + 4].copy_from_slice(&component.to_le_bytes());
  }
}

fn push_vec3(data: &mut Vec<u8>, value: Vec3) {
  for component in value.to_array() {
    data.extend_from_slice(&component.to_le_bytes());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn positions(count: usize) -> Vec<u8> {
    let layout = HalaVertexLayout::standard();
    let mut data = vec![0u8; count * layout.stride()];
    for i in 0..count {
      write_vec3(&mut data, i * layout.stride(), Vec3::new(i as f32, 0.0, 0.0));
    }
    data
  }

  #[test]
  fn record_size_follows_mask() {
    assert_eq!(HalaVertexBufferMorph::record_size(0), 4);
    assert_eq!(HalaVertexBufferMorph::record_size(MORPH_MASK_POSITION), 16);
    assert_eq!(HalaVertexBufferMorph::record_size(MORPH_MASK_POSITION | MORPH_MASK_NORMAL | MORPH_MASK_TANGENT), 40);
  }

  #[test]
  fn encode_decode_keeps_deltas() {
    let morph = HalaVertexBufferMorph::new(MORPH_MASK_POSITION | MORPH_MASK_TANGENT, vec![
      HalaMorphDelta { vertex_index: 3, position: Vec3::new(1.0, 2.0, 3.0), normal: Vec3::ZERO, tangent: Vec3::Y },
    ]);
    let data = morph.encode();
    assert_eq!(data.len(), 28);
    assert_eq!(HalaVertexBufferMorph::decode(morph.element_mask, &data), morph);
  }

  #[test]
  fn sparse_application_only_moves_listed_vertices() {
    let layout = HalaVertexLayout::standard();
    let mut data = positions(8);
    let before = data.clone();
    let morph = HalaVertexBufferMorph::new(MORPH_MASK_POSITION, vec![
      HalaMorphDelta { vertex_index: 5, position: Vec3::new(0.0, 1.0, 0.0), ..Default::default() },
    ]);
    morph.apply(&layout, &mut data, 0.5);

    assert_eq!(read_vec3(&data, 5 * 48), Vec3::new(5.0, 0.5, 0.0));
    for i in (0..8).filter(|&i| i != 5) {
      assert_eq!(&data[i * 48..(i + 1) * 48], &before[i * 48..(i + 1) * 48]);
    }
    // Normals of vertex 5 are untouched.
    assert_eq!(&data[5 * 48 + 12..5 * 48 + 24], &before[5 * 48 + 12..5 * 48 + 24]);
  }

  #[test]
  fn weights_accumulate_linearly() {
    let layout = HalaVertexLayout::standard();
    let mut data = positions(2);
    let morph = HalaVertexBufferMorph::new(MORPH_MASK_POSITION, vec![
      HalaMorphDelta { vertex_index: 1, position: Vec3::new(0.0, 0.0, 2.0), ..Default::default() },
    ]);
    morph.apply(&layout, &mut data, 0.25);
    morph.apply(&layout, &mut data, 0.5);
    assert_eq!(read_vec3(&data, 48), Vec3::new(1.0, 0.0, 1.5));
  }

  #[test]
  fn validation_rejects_out_of_range_vertex() {
    let buffers = vec![HalaVertexBuffer::new(4, HalaVertexLayout::standard(), vec![0; 4 * 48]).unwrap()];
    let mut morph = HalaModelMorph::new("smile");
    morph.buffers.insert(0, HalaVertexBufferMorph::new(MORPH_MASK_POSITION, vec![
      HalaMorphDelta { vertex_index: 4, ..Default::default() },
    ]));
    let err = morph.validate(&buffers).unwrap_err();
    assert!(matches!(err, HalaModelError::MorphIndexOutOfRange { buffer: 0, vertex: 4, count: 4, .. }));
  }

  #[test]
  fn validation_rejects_missing_buffer_without_deltas() {
    let mut morph = HalaModelMorph::new("blink");
    morph.buffers.insert(7, HalaVertexBufferMorph::new(MORPH_MASK_POSITION, Vec::new()));
    let err = morph.validate(&[]).unwrap_err();
    assert!(matches!(err, HalaModelError::MorphBufferOutOfRange { buffer: 7, count: 0, .. }));
  }
}
