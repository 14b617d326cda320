use std::borrow::Cow;
use std::io::Write;

use glam::Affine3A;

use crate::error::{
  HalaModelError,
  HalaBufferKind,
};
use crate::model::model::{
  HalaModel,
  HalaModelState,
};
use crate::model::skeleton::{
  HalaBone,
  BONE_COLLISION_SPHERE,
  BONE_COLLISION_BOX,
};
use super::device_uploader::HalaBufferDevice;
use super::model_loader::MODEL_FILE_ID;
use super::stream::HalaBinaryWriter;

/// Flatten an affine transform to a 3x4 row-major matrix.
fn affine_to_rows(affine: &Affine3A) -> [f32; 12] {
  let m = &affine.matrix3;
  let t = affine.translation;
  [
    m.x_axis.x, m.y_axis.x, m.z_axis.x, t.x,
    m.x_axis.y, m.y_axis.y, m.z_axis.y, t.y,
    m.x_axis.z, m.y_axis.z, m.z_axis.z, t.z,
  ]
}

fn write_bone<W: Write>(writer: &mut HalaBinaryWriter<W>, index: u32, bone: &HalaBone) -> Result<(), HalaModelError> {
  writer.write_string(&bone.name)?;
  writer.write_u32(bone.parent.unwrap_or(index))?;
  writer.write_vec3(bone.initial_position)?;
  writer.write_quat(bone.initial_rotation)?;
  writer.write_vec3(bone.initial_scale)?;
  for value in affine_to_rows(&bone.offset_matrix) {
    writer.write_f32(value)?;
  }
  writer.write_u8(bone.collision_mask)?;
  if bone.collision_mask & BONE_COLLISION_SPHERE != 0 {
    writer.write_f32(bone.radius)?;
  }
  if bone.collision_mask & BONE_COLLISION_BOX != 0 {
    writer.write_bounding_box(&bone.bounding_box)?;
  }
  Ok(())
}

/// The save implementation of the model.
impl HalaModel {
  /// Write the model in the explicit element list container.
  /// Buffers without a shadow copy are read back from the device.
  /// Nothing is written when a check fails.
  /// param writer: The byte sink.
  /// param device: The device holding unshadowed buffers, if any.
  /// return: The result.
  pub fn save<W: Write>(&self, writer: W, device: Option<&dyn HalaBufferDevice>) -> Result<(), HalaModelError> {
    if self.state == HalaModelState::PendingUpload {
      log::error!("Model \"{}\" can not be saved before its buffers are uploaded.", self.name);
      return Err(HalaModelError::NotFinalized);
    }

    let mut vertex_data = Vec::with_capacity(self.vertex_buffers.len());
    for (index, buffer) in self.vertex_buffers.iter().enumerate() {
      let data = match buffer.shadow_data() {
        Some(data) => Cow::Borrowed(data),
        None => Cow::Owned(device.and_then(|device| buffer.read_back(device))
          .ok_or(HalaModelError::UnshadowedBuffer { kind: HalaBufferKind::Vertex, index: index as u32 })
          .inspect_err(|err| log::error!("Failed to save model \"{}\": {}", self.name, err))?),
      };
      vertex_data.push(data);
    }
    let mut index_data = Vec::with_capacity(self.index_buffers.len());
    for (index, buffer) in self.index_buffers.iter().enumerate() {
      let data = match buffer.shadow_data() {
        Some(data) => Cow::Borrowed(data),
        None => Cow::Owned(device.and_then(|device| buffer.read_back(device))
          .ok_or(HalaModelError::UnshadowedBuffer { kind: HalaBufferKind::Index, index: index as u32 })
          .inspect_err(|err| log::error!("Failed to save model \"{}\": {}", self.name, err))?),
      };
      index_data.push(data);
    }
    for (geometry_index, geometry) in self.geometries.iter().enumerate() {
      if let Some(lod) = geometry.lod_levels().position(|level| level.is_none()) {
        log::error!("Model \"{}\" has an unset LOD level {} in geometry {}.", self.name, lod, geometry_index);
        return Err(HalaModelError::IncompleteGeometry { geometry: geometry_index as u32, lod: lod as u32 });
      }
    }

    let mut writer = HalaBinaryWriter::new(writer);
    writer.write_file_id(&MODEL_FILE_ID)?;

    writer.write_u32(self.vertex_buffers.len() as u32)?;
    for (buffer, data) in self.vertex_buffers.iter().zip(vertex_data.iter()) {
      writer.write_u32(buffer.vertex_count())?;
      writer.write_u32(buffer.layout().len() as u32)?;
      for element in buffer.layout().elements() {
        writer.write_u32(element.to_packed())?;
      }
      writer.write_u32(buffer.morph_range_start())?;
      writer.write_u32(buffer.morph_range_count())?;
      writer.write_bytes(data)?;
    }

    writer.write_u32(self.index_buffers.len() as u32)?;
    for (buffer, data) in self.index_buffers.iter().zip(index_data.iter()) {
      writer.write_u32(buffer.index_count())?;
      writer.write_u32(buffer.index_size())?;
      writer.write_bytes(data)?;
    }

    writer.write_u32(self.geometries.len() as u32)?;
    for geometry in self.geometries.iter() {
      writer.write_u32(geometry.bone_mapping.len() as u32)?;
      for &bone in geometry.bone_mapping.iter() {
        writer.write_u32(bone)?;
      }
      writer.write_u32(geometry.num_lod_levels() as u32)?;
      for level in geometry.lod_levels().flatten() {
        writer.write_f32(level.distance)?;
        writer.write_u32(level.topology as u32)?;
        writer.write_u32(level.vertex_buffer.0)?;
        writer.write_u32(level.index_buffer.0)?;
        writer.write_u32(level.index_start)?;
        writer.write_u32(level.index_count)?;
      }
    }

    writer.write_u32(self.morphs.len() as u32)?;
    for morph in self.morphs.iter() {
      writer.write_string(&morph.name)?;
      writer.write_u32(morph.buffers.len() as u32)?;
      for (&buffer_index, buffer_morph) in morph.buffers.iter() {
        writer.write_u32(buffer_index)?;
        writer.write_u32(buffer_morph.element_mask)?;
        writer.write_u32(buffer_morph.vertex_count())?;
        writer.write_bytes(&buffer_morph.encode())?;
      }
    }

    writer.write_u32(self.skeleton.num_bones())?;
    for (index, bone) in self.skeleton.bones().iter().enumerate() {
      write_bone(&mut writer, index as u32, bone)?;
    }

    writer.write_bounding_box(&self.bounding_box)?;
    for geometry in self.geometries.iter() {
      writer.write_vec3(geometry.center)?;
    }
    writer.flush()?;

    log::debug!("Model \"{}\" saved.", self.name);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::{
    Quat,
    Vec3,
  };
  use crate::model::loader::model_loader::affine_from_rows;

  #[test]
  fn offset_matrix_rows_round_trip() {
    let affine = Affine3A::from_scale_rotation_translation(
      Vec3::new(1.0, 2.0, 3.0),
      Quat::from_rotation_y(0.5),
      Vec3::new(4.0, 5.0, 6.0));
    let rows = affine_to_rows(&affine);
    assert_eq!(rows[3], 4.0);
    assert_eq!(rows[7], 5.0);
    assert_eq!(rows[11], 6.0);
    assert_eq!(affine_from_rows(&rows), affine);
  }

  #[test]
  fn unset_lod_level_is_not_saved() {
    let mut model = HalaModel::new("incomplete");
    model.set_num_geometries(1).unwrap();
    let mut data = Vec::new();
    let err = model.save(&mut data, None).unwrap_err();
    assert!(matches!(err, HalaModelError::IncompleteGeometry { geometry: 0, lod: 0 }));
    assert!(data.is_empty());
  }
}
