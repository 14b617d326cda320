use std::collections::BTreeMap;

use crate::error::{
  HalaModelError,
  HalaBufferKind,
};
use super::buffer::{
  HalaBufferState,
  HalaVertexBuffer,
  HalaIndexBuffer,
  HalaVertexBufferHandle,
  HalaIndexBufferHandle,
};
use super::geometry::HalaGeometry;
use super::model::{
  HalaModel,
  HalaModelState,
};
use super::morph::HalaModelMorph;
use super::loader::device_uploader::HalaBufferDevice;

/// A buffer that could not be copied into a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalaCloneSlotFailure {
  pub kind: HalaBufferKind,
  pub index: u32,
  /// Every (geometry, lod) slot that referenced the buffer.
  pub slots: Vec<(u32, u32)>,
}

impl HalaCloneSlotFailure {
  /// Convert the failure to the crate error.
  /// return: The error.
  pub fn to_error(&self) -> HalaModelError {
    HalaModelError::CloneSlotFailed {
      kind: self.kind,
      index: self.index,
      slots: self.slots.clone(),
    }
  }
}

/// The result of a clone: the new model and the slots that could not be copied.
pub struct HalaModelClone {
  pub model: HalaModel,
  pub failures: Vec<HalaCloneSlotFailure>,
}

impl HalaModelClone {
  pub fn is_complete(&self) -> bool {
    self.failures.is_empty()
  }
}

/// Copy every buffer of an arena, returning the copies and the old to new handle mapping.
fn clone_arena<B, F>(
  buffers: &[B],
  mut copy: F,
) -> (Vec<B>, Vec<Option<u32>>, Vec<u32>)
where
  F: FnMut(&B) -> Result<B, HalaModelError>,
{
  let mut cloned = Vec::with_capacity(buffers.len());
  let mut mapping = Vec::with_capacity(buffers.len());
  let mut failed = Vec::new();
  for (index, buffer) in buffers.iter().enumerate() {
    match copy(buffer) {
      Ok(buffer) => {
        mapping.push(Some(cloned.len() as u32));
        cloned.push(buffer);
      },
      Err(err) => {
        log::warn!("Failed to clone buffer {}: {}", index, err);
        mapping.push(None);
        failed.push(index as u32);
      },
    }
  }
  (cloned, mapping, failed)
}

/// The clone implementation of the model.
impl HalaModel {
  /// Create an independent copy of the model.
  /// Buffers shared between geometries stay shared inside the clone.
  /// A buffer that is neither shadowed nor readable from the device is reported, not replaced.
  /// param name: The name of the clone.
  /// param device: The device holding the uploaded buffers.
  /// return: The clone and the failed slots.
  pub fn clone_model(
    &self,
    name: &str,
    device: &mut dyn HalaBufferDevice,
  ) -> Result<HalaModelClone, HalaModelError> {
    match self.state {
      HalaModelState::Ready => (),
      HalaModelState::PendingUpload => {
        log::error!("Model \"{}\" can not be cloned before its buffers are uploaded.", self.name);
        return Err(HalaModelError::NotFinalized);
      },
      HalaModelState::Empty => {
        log::error!("Model \"{}\" is empty and can not be cloned.", self.name);
        return Err(HalaModelError::NotFinalized);
      },
    }
    let keep_shadow_data = self.config.keep_shadow_data;

    let (vertex_buffers, vertex_mapping, failed_vertex_buffers) = clone_arena(
      &self.vertex_buffers,
      |buffer: &HalaVertexBuffer| {
        let data = buffer.read_back(&*device)
          .ok_or(HalaModelError::Device("Vertex data can not be read back.".to_string()))?;
        let mut copy = buffer.with_same_shape(data)?;
        if matches!(buffer.state(), HalaBufferState::Uploaded(_)) {
          copy.upload(&mut *device, keep_shadow_data)?;
        }
        Ok(copy)
      });
    let (index_buffers, index_mapping, failed_index_buffers) = clone_arena(
      &self.index_buffers,
      |buffer: &HalaIndexBuffer| {
        let data = buffer.read_back(&*device)
          .ok_or(HalaModelError::Device("Index data can not be read back.".to_string()))?;
        let mut copy = buffer.with_same_shape(data)?;
        if matches!(buffer.state(), HalaBufferState::Uploaded(_)) {
          copy.upload(&mut *device, keep_shadow_data)?;
        }
        Ok(copy)
      });

    let mut failures: Vec<HalaCloneSlotFailure> = failed_vertex_buffers.into_iter()
      .map(|index| HalaCloneSlotFailure { kind: HalaBufferKind::Vertex, index, slots: Vec::new() })
      .chain(failed_index_buffers.into_iter()
        .map(|index| HalaCloneSlotFailure { kind: HalaBufferKind::Index, index, slots: Vec::new() }))
      .collect();

    let mut geometries = Vec::with_capacity(self.geometries.len());
    for (geometry_index, geometry) in self.geometries.iter().enumerate() {
      let mut lod_levels = Vec::with_capacity(geometry.num_lod_levels());
      for (lod, level) in geometry.lod_levels.iter().enumerate() {
        let Some(level) = level else {
          lod_levels.push(None);
          continue;
        };
        let slot = (geometry_index as u32, lod as u32);
        let vertex_buffer = vertex_mapping.get(level.vertex_buffer.index()).copied().flatten();
        let index_buffer = index_mapping.get(level.index_buffer.index()).copied().flatten();
        if vertex_buffer.is_none() {
          record_slot(&mut failures, HalaBufferKind::Vertex, level.vertex_buffer.0, slot);
        }
        if index_buffer.is_none() {
          record_slot(&mut failures, HalaBufferKind::Index, level.index_buffer.0, slot);
        }
        lod_levels.push(match (vertex_buffer, index_buffer) {
          (Some(vertex_buffer), Some(index_buffer)) => {
            let mut level = *level;
            level.vertex_buffer = HalaVertexBufferHandle(vertex_buffer);
            level.index_buffer = HalaIndexBufferHandle(index_buffer);
            Some(level)
          },
          _ => None,
        });
      }
      geometries.push(HalaGeometry {
        lod_levels,
        bone_mapping: geometry.bone_mapping.clone(),
        center: geometry.center,
      });
    }

    let morphs = self.morphs.iter()
      .map(|morph| HalaModelMorph {
        name: morph.name.clone(),
        buffers: morph.buffers.iter()
          .filter_map(|(&buffer_index, buffer_morph)| {
            vertex_mapping.get(buffer_index as usize)
              .copied()
              .flatten()
              .map(|new_index| (new_index, buffer_morph.clone()))
          })
          .collect::<BTreeMap<_, _>>(),
      })
      .collect();

    let mut model = HalaModel::with_config(name, self.config.clone());
    model.vertex_buffers = vertex_buffers;
    model.index_buffers = index_buffers;
    model.geometries = geometries;
    model.morphs = morphs;
    model.skeleton = self.skeleton.clone();
    model.bounding_box = self.bounding_box;
    model.state = HalaModelState::Ready;

    for failure in failures.iter() {
      log::warn!("Clone \"{}\" of \"{}\": {}", name, self.name, failure.to_error());
    }
    log::debug!("Model \"{}\" cloned to \"{}\" with {} failed buffers.", self.name, name, failures.len());
    Ok(HalaModelClone { model, failures })
  }
}

fn record_slot(failures: &mut [HalaCloneSlotFailure], kind: HalaBufferKind, index: u32, slot: (u32, u32)) {
  if let Some(failure) = failures.iter_mut().find(|failure| failure.kind == kind && failure.index == index) {
    failure.slots.push(slot);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::Vec3;
  use crate::config::HalaModelConfig;
  use crate::model::geometry::{
    HalaLodLevel,
    HalaPrimitiveTopology,
  };
  use crate::model::vertex::HalaVertexLayout;
  use crate::model::loader::device_uploader::HalaHostDevice;

  fn shared_model(config: HalaModelConfig) -> HalaModel {
    let mut model = HalaModel::with_config("source", config);
    model.set_vertex_buffers(vec![
      HalaVertexBuffer::new(3, HalaVertexLayout::standard(), vec![1; 3 * 48]).unwrap(),
    ]).unwrap();
    model.set_index_buffers(vec![
      HalaIndexBuffer::from_u16(&[0, 1, 2]),
      HalaIndexBuffer::from_u16(&[2, 1, 0]),
    ]).unwrap();
    model.set_num_geometries(2).unwrap();
    for geometry in 0..2 {
      model.set_geometry(geometry, 0, HalaLodLevel {
        distance: 0.0,
        topology: HalaPrimitiveTopology::TriangleList,
        vertex_buffer: HalaVertexBufferHandle(0),
        index_buffer: HalaIndexBufferHandle(geometry as u32),
        index_start: 0,
        index_count: 3,
      }).unwrap();
    }
    model.set_geometry_center(1, Vec3::ONE).unwrap();
    model
  }

  #[test]
  fn clone_keeps_sharing_inside_the_clone() {
    let mut device = HalaHostDevice::new();
    let source = shared_model(HalaModelConfig::default());
    let clone = source.clone_model("copy", &mut device).unwrap();
    assert!(clone.is_complete());

    let model = clone.model;
    assert_eq!(model.name(), "copy");
    assert!(model.is_ready());
    assert_eq!(model.vertex_buffers().len(), 1);
    assert_eq!(model.geometry(0, 0).map(|level| level.vertex_buffer), model.geometry(1, 0).map(|level| level.vertex_buffer));
    assert_eq!(model.geometry_center(1), Some(Vec3::ONE));
  }

  #[test]
  fn clone_of_empty_model_is_rejected() {
    let mut device = HalaHostDevice::new();
    let model = HalaModel::new("empty");
    assert!(matches!(model.clone_model("copy", &mut device), Err(HalaModelError::NotFinalized)));
  }

  #[test]
  fn unreadable_buffers_are_reported_per_slot() {
    let config = HalaModelConfig { keep_shadow_data: false, ..Default::default() };
    let mut device = HalaHostDevice::write_only();
    let mut source = shared_model(config);
    source.upload_buffers(&mut device).unwrap();

    let clone = source.clone_model("copy", &mut device).unwrap();
    assert_eq!(clone.failures.len(), 3);
    let vertex_failure = &clone.failures[0];
    assert_eq!(vertex_failure.kind, HalaBufferKind::Vertex);
    assert_eq!(vertex_failure.slots, vec![(0, 0), (1, 0)]);
    assert!(clone.model.vertex_buffers().is_empty());
    assert!(clone.model.geometry(0, 0).is_none());
    assert!(!clone.failures[0].to_error().is_fatal());
  }
}
