use glam::Vec3;

use crate::error::HalaModelError;
use super::buffer::{
  HalaVertexBufferHandle,
  HalaIndexBufferHandle,
};

/// The primitive topology of a draw range.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HalaPrimitiveTopology {
  TriangleList = 0,
  LineList = 1,
  PointList = 2,
  TriangleStrip = 3,
  LineStrip = 4,
  TriangleFan = 5,
}

/// The implementation of the primitive topology.
impl HalaPrimitiveTopology {
  /// Convert the wire value to a topology.
  /// param value: The wire value.
  /// return: The topology.
  pub fn from_u32(value: u32) -> Result<Self, HalaModelError> {
    match value {
      0 => Ok(HalaPrimitiveTopology::TriangleList),
      1 => Ok(HalaPrimitiveTopology::LineList),
      2 => Ok(HalaPrimitiveTopology::PointList),
      3 => Ok(HalaPrimitiveTopology::TriangleStrip),
      4 => Ok(HalaPrimitiveTopology::LineStrip),
      5 => Ok(HalaPrimitiveTopology::TriangleFan),
      _ => Err(HalaModelError::InvalidPrimitiveTopology(value)),
    }
  }
}

/// One level of detail of a geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct HalaLodLevel {
  pub distance: f32,
  pub topology: HalaPrimitiveTopology,
  pub vertex_buffer: HalaVertexBufferHandle,
  pub index_buffer: HalaIndexBufferHandle,
  pub index_start: u32,
  pub index_count: u32,
}

/// A geometry: its LOD levels, nearest first, the skin bone mapping and the center.
#[derive(Debug, Clone, PartialEq)]
pub struct HalaGeometry {
  pub(crate) lod_levels: Vec<Option<HalaLodLevel>>,
  pub bone_mapping: Vec<u32>,
  pub center: Vec3,
}

impl Default for HalaGeometry {
  fn default() -> Self {
    Self {
      lod_levels: vec![None],
      bone_mapping: Vec::new(),
      center: Vec3::ZERO,
    }
  }
}

/// The implementation of the geometry.
impl HalaGeometry {
  /// Create a geometry from fully defined LOD levels.
  /// param lod_levels: The LOD levels, nearest first.
  /// return: The geometry.
  pub fn new(lod_levels: Vec<HalaLodLevel>) -> Self {
    Self {
      lod_levels: lod_levels.into_iter().map(Some).collect(),
      ..Default::default()
    }
  }

  pub fn num_lod_levels(&self) -> usize {
    self.lod_levels.len()
  }

  /// Get a LOD level, clamping the level to the farthest one.
  /// param lod: The LOD level.
  /// return: The LOD level if it is set.
  pub fn lod_level(&self, lod: usize) -> Option<&HalaLodLevel> {
    let last = self.lod_levels.len().checked_sub(1)?;
    self.lod_levels[lod.min(last)].as_ref()
  }

  /// Iterate over the LOD slots, unset slots are None.
  pub fn lod_levels(&self) -> impl Iterator<Item = Option<&HalaLodLevel>> {
    self.lod_levels.iter().map(|level| level.as_ref())
  }

  /// Select the LOD level to draw at the view distance.
  /// A level is used once the distance exceeds its switch distance.
  /// param distance: The view distance.
  /// return: The LOD level index.
  pub fn lod_level_for_distance(&self, distance: f32) -> usize {
    let mut selected = 0;
    for (index, level) in self.lod_levels.iter().enumerate().skip(1) {
      match level {
        Some(level) if distance > level.distance => selected = index,
        _ => break,
      }
    }
    selected
  }

  /// Find the first LOD level whose distance is smaller than a set level before it.
  /// return: The offending LOD level index.
  pub fn first_non_monotonic_lod(&self) -> Option<usize> {
    let mut previous: Option<f32> = None;
    for (index, level) in self.lod_levels.iter().enumerate() {
      if let Some(level) = level {
        if level.distance.is_nan() {
          return Some(index);
        }
        if let Some(previous) = previous {
          if level.distance < previous {
            return Some(index);
          }
        }
        previous = Some(level.distance);
      }
    }
    None
  }

  /// Check whether the level can be placed in the slot without breaking distance order.
  /// param lod: The slot.
  /// param level: The level.
  /// return: True if the nearest set neighbours keep the order.
  pub(crate) fn fits_lod_order(&self, lod: usize, level: &HalaLodLevel) -> bool {
    let before = self.lod_levels[..lod].iter().rev().flatten().next();
    let after = self.lod_levels[lod + 1..].iter().flatten().next();
    before.map_or(true, |before| before.distance <= level.distance)
      && after.map_or(true, |after| level.distance <= after.distance)
  }
}
