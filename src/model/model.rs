use glam::Vec3;

use crate::config::HalaModelConfig;
use crate::error::{
  HalaModelError,
  HalaBufferKind,
};
use super::bounds::HalaBoundingBox;
use super::buffer::{
  HalaVertexBuffer,
  HalaIndexBuffer,
  HalaVertexBufferHandle,
  HalaIndexBufferHandle,
};
use super::geometry::{
  HalaGeometry,
  HalaLodLevel,
  HalaPrimitiveTopology,
};
use super::morph::HalaModelMorph;
use super::skeleton::HalaSkeleton;
use super::primitive::HalaPrimitive;
use super::vertex::HalaVertexLayout;
use super::loader::device_uploader::{
  HalaBufferDevice,
  HalaDeviceBufferId,
};

/// The load state of a model.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HalaModelState {
  /// Nothing loaded, or the last load failed.
  Empty,
  /// Parsed asynchronously, buffers wait for the finalize step.
  PendingUpload,
  /// Usable for rendering, saving and cloning.
  Ready,
}

/// A model: vertex and index buffers, geometries with LOD levels, skeleton and morphs.
pub struct HalaModel {
  pub(crate) name: String,
  pub(crate) config: HalaModelConfig,
  pub(crate) state: HalaModelState,
  pub(crate) load_generation: u64,
  pub(crate) vertex_buffers: Vec<HalaVertexBuffer>,
  pub(crate) index_buffers: Vec<HalaIndexBuffer>,
  pub(crate) geometries: Vec<HalaGeometry>,
  pub(crate) bounding_box: HalaBoundingBox,
  pub(crate) skeleton: HalaSkeleton,
  pub(crate) morphs: Vec<HalaModelMorph>,
  /// Device buffers of discarded content, freed on the next call that gets a device.
  pub(crate) retired_buffers: Vec<HalaDeviceBufferId>,
}

/// The Drop implementation of the model.
impl Drop for HalaModel {
  fn drop(&mut self) {
    let live = self.num_device_buffers();
    if live > 0 {
      log::warn!("A HalaModel \"{}\" dropped with {} device buffers not released.", self.name, live);
    }
    log::debug!("A HalaModel \"{}\" dropped.", self.name);
  }
}

/// Check a LOD level against the buffers it references.
/// param geometry: The geometry index, for error reporting.
/// param lod: The LOD level index, for error reporting.
/// param level: The LOD level.
/// param vertex_buffer_count: The number of vertex buffers.
/// param index_buffers: The index buffers.
/// return: The result.
pub(crate) fn validate_lod_level(
  geometry: u32,
  lod: u32,
  level: &HalaLodLevel,
  vertex_buffer_count: usize,
  index_buffers: &[HalaIndexBuffer],
) -> Result<(), HalaModelError> {
  if !level.distance.is_finite() {
    return Err(HalaModelError::InvalidLodDistance { geometry, lod, distance: level.distance });
  }
  if level.vertex_buffer.index() >= vertex_buffer_count {
    return Err(HalaModelError::DanglingBufferReference {
      geometry,
      lod,
      kind: HalaBufferKind::Vertex,
      index: level.vertex_buffer.0,
      count: vertex_buffer_count as u32,
    });
  }
  let index_buffer = index_buffers.get(level.index_buffer.index())
    .ok_or(HalaModelError::DanglingBufferReference {
      geometry,
      lod,
      kind: HalaBufferKind::Index,
      index: level.index_buffer.0,
      count: index_buffers.len() as u32,
    })?;
  let start = level.index_start as u64;
  let end = start + level.index_count as u64;
  if end > index_buffer.index_count() as u64 {
    return Err(HalaModelError::InvalidDrawRange {
      geometry,
      lod,
      start,
      end,
      count: index_buffer.index_count(),
    });
  }
  Ok(())
}

/// The implementation of the model.
impl HalaModel {
  /// Create a new empty model.
  /// param name: The model name.
  /// return: The model.
  pub fn new(name: &str) -> Self {
    Self::with_config(name, HalaModelConfig::default())
  }

  /// Create a new empty model with options.
  /// param name: The model name.
  /// param config: The options.
  /// return: The model.
  pub fn with_config(name: &str, config: HalaModelConfig) -> Self {
    log::debug!("A HalaModel \"{}\" created.", name);
    Self {
      name: name.to_owned(),
      config,
      state: HalaModelState::Empty,
      load_generation: 0,
      vertex_buffers: Vec::new(),
      index_buffers: Vec::new(),
      geometries: Vec::new(),
      bounding_box: HalaBoundingBox::default(),
      skeleton: HalaSkeleton::default(),
      morphs: Vec::new(),
      retired_buffers: Vec::new(),
    }
  }

  /// Create a one geometry, one LOD model from an imported primitive.
  /// param name: The model name.
  /// param primitive: The imported vertices and indices.
  /// return: The model.
  pub fn from_primitive(name: &str, primitive: &HalaPrimitive) -> Result<Self, HalaModelError> {
    let vertex_buffer = HalaVertexBuffer::new(
      primitive.vertices.len() as u32,
      HalaVertexLayout::standard(),
      primitive.vertex_bytes())?;
    let index_buffer = if primitive.fits_u16_indices() {
      let indices: Vec<u16> = primitive.indices.iter().map(|&index| index as u16).collect();
      HalaIndexBuffer::from_u16(&indices)
    } else {
      HalaIndexBuffer::from_u32(&primitive.indices)
    };
    let bounding_box = HalaBoundingBox::from_points(primitive.vertices.iter().map(|vertex| vertex.position));

    let mut model = Self::new(name);
    model.set_vertex_buffers(vec![vertex_buffer])?;
    model.set_index_buffers(vec![index_buffer])?;
    model.set_num_geometries(1)?;
    model.set_geometry(0, 0, HalaLodLevel {
      distance: 0.0,
      topology: HalaPrimitiveTopology::TriangleList,
      vertex_buffer: HalaVertexBufferHandle(0),
      index_buffer: HalaIndexBufferHandle(0),
      index_start: 0,
      index_count: primitive.indices.len() as u32,
    })?;
    model.set_geometry_center(0, bounding_box.get_center())?;
    model.set_bounding_box(bounding_box)?;
    Ok(model)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn set_name(&mut self, name: &str) {
    self.name = name.to_owned();
  }

  pub fn config(&self) -> &HalaModelConfig {
    &self.config
  }

  pub fn state(&self) -> HalaModelState {
    self.state
  }

  pub fn is_ready(&self) -> bool {
    self.state == HalaModelState::Ready
  }

  /// Drop all content and return to the empty state.
  /// Device buffers of the dropped content are retired until a device is at hand.
  pub(crate) fn reset(&mut self) {
    self.retire_vertex_buffers();
    self.retire_index_buffers();
    self.geometries.clear();
    self.morphs.clear();
    self.skeleton = HalaSkeleton::default();
    self.bounding_box = HalaBoundingBox::default();
    self.state = HalaModelState::Empty;
  }

  fn retire_vertex_buffers(&mut self) {
    self.retired_buffers.extend(self.vertex_buffers.drain(..).filter_map(|buffer| buffer.device_buffer()));
  }

  fn retire_index_buffers(&mut self) {
    self.retired_buffers.extend(self.index_buffers.drain(..).filter_map(|buffer| buffer.device_buffer()));
  }

  /// Free the device buffers of content the model no longer holds.
  /// param device: The device.
  pub(crate) fn release_retired_buffers(&mut self, device: &mut dyn HalaBufferDevice) {
    if self.retired_buffers.is_empty() {
      return;
    }
    log::debug!("Model \"{}\" releases {} retired device buffers.", self.name, self.retired_buffers.len());
    for id in self.retired_buffers.drain(..) {
      device.release_buffer(id);
    }
  }

  /// Get the number of device buffers the model still owns, retired ones included.
  /// return: The device buffer count.
  pub fn num_device_buffers(&self) -> usize {
    self.retired_buffers.len()
      + self.vertex_buffers.iter().filter(|buffer| buffer.device_buffer().is_some()).count()
      + self.index_buffers.iter().filter(|buffer| buffer.device_buffer().is_some()).count()
  }

  /// Free every device buffer the model owns.
  /// Shadowed buffers can be uploaded again, unshadowed buffers lose their bytes.
  /// param device: The device holding the buffers.
  pub fn release_buffers(&mut self, device: &mut dyn HalaBufferDevice) {
    self.release_retired_buffers(device);
    let mut released = 0;
    for buffer in self.vertex_buffers.iter_mut() {
      if buffer.release(device) {
        released += 1;
      }
    }
    for buffer in self.index_buffers.iter_mut() {
      if buffer.release(device) {
        released += 1;
      }
    }
    log::debug!("Model \"{}\" released {} device buffers.", self.name, released);
  }

  fn begin_edit(&mut self) -> Result<(), HalaModelError> {
    if self.state == HalaModelState::PendingUpload {
      log::error!("Model \"{}\" can not be edited while buffers are pending upload.", self.name);
      return Err(HalaModelError::NotFinalized);
    }
    self.state = HalaModelState::Ready;
    Ok(())
  }

  pub fn vertex_buffers(&self) -> &[HalaVertexBuffer] {
    &self.vertex_buffers
  }

  pub fn index_buffers(&self) -> &[HalaIndexBuffer] {
    &self.index_buffers
  }

  pub fn vertex_buffer(&self, handle: HalaVertexBufferHandle) -> Option<&HalaVertexBuffer> {
    self.vertex_buffers.get(handle.index())
  }

  pub fn vertex_buffer_mut(&mut self, handle: HalaVertexBufferHandle) -> Option<&mut HalaVertexBuffer> {
    self.vertex_buffers.get_mut(handle.index())
  }

  pub fn index_buffer(&self, handle: HalaIndexBufferHandle) -> Option<&HalaIndexBuffer> {
    self.index_buffers.get(handle.index())
  }

  pub fn index_buffer_mut(&mut self, handle: HalaIndexBufferHandle) -> Option<&mut HalaIndexBuffer> {
    self.index_buffers.get_mut(handle.index())
  }

  pub fn num_geometries(&self) -> usize {
    self.geometries.len()
  }

  pub fn geometries(&self) -> &[HalaGeometry] {
    &self.geometries
  }

  pub fn num_geometry_lod_levels(&self, index: usize) -> usize {
    self.geometries.get(index).map_or(0, |geometry| geometry.num_lod_levels())
  }

  /// Get a LOD level of a geometry. The LOD level is clamped to the last one.
  /// param index: The geometry index.
  /// param lod: The LOD level.
  /// return: The LOD level if it is set.
  pub fn geometry(&self, index: usize, lod: usize) -> Option<&HalaLodLevel> {
    self.geometries.get(index).and_then(|geometry| geometry.lod_level(lod))
  }

  pub fn geometry_center(&self, index: usize) -> Option<Vec3> {
    self.geometries.get(index).map(|geometry| geometry.center)
  }

  pub fn geometry_bone_mapping(&self, index: usize) -> Option<&[u32]> {
    self.geometries.get(index).map(|geometry| geometry.bone_mapping.as_slice())
  }

  pub fn bounding_box(&self) -> &HalaBoundingBox {
    &self.bounding_box
  }

  pub fn skeleton(&self) -> &HalaSkeleton {
    &self.skeleton
  }

  pub fn morphs(&self) -> &[HalaModelMorph] {
    &self.morphs
  }

  pub fn morph(&self, index: usize) -> Option<&HalaModelMorph> {
    self.morphs.get(index)
  }

  pub fn morph_by_name(&self, name: &str) -> Option<&HalaModelMorph> {
    self.morphs.iter().find(|morph| morph.name == name)
  }

  pub fn morph_range_start(&self, handle: HalaVertexBufferHandle) -> u32 {
    self.vertex_buffer(handle).map_or(0, |buffer| buffer.morph_range_start())
  }

  pub fn morph_range_count(&self, handle: HalaVertexBufferHandle) -> u32 {
    self.vertex_buffer(handle).map_or(0, |buffer| buffer.morph_range_count())
  }

  /// Set the vertex buffers. Every buffer must be shadowed.
  /// param buffers: The vertex buffers.
  /// return: The result.
  pub fn set_vertex_buffers(&mut self, buffers: Vec<HalaVertexBuffer>) -> Result<(), HalaModelError> {
    if let Some(index) = buffers.iter().position(|buffer| !buffer.is_shadowed()) {
      log::error!("Model vertex buffers must be shadowed, buffer {} is not.", index);
      return Err(HalaModelError::UnshadowedBuffer { kind: HalaBufferKind::Vertex, index: index as u32 });
    }
    for (geometry_index, geometry) in self.geometries.iter().enumerate() {
      for (lod, level) in geometry.lod_levels.iter().enumerate() {
        if let Some(level) = level {
          if level.vertex_buffer.index() >= buffers.len() {
            log::error!("Geometry {} still references vertex buffer {}.", geometry_index, level.vertex_buffer.0);
            return Err(HalaModelError::DanglingBufferReference {
              geometry: geometry_index as u32,
              lod: lod as u32,
              kind: HalaBufferKind::Vertex,
              index: level.vertex_buffer.0,
              count: buffers.len() as u32,
            });
          }
        }
      }
    }
    for morph in self.morphs.iter() {
      morph.validate(&buffers)?;
    }
    self.begin_edit()?;
    self.retire_vertex_buffers();
    self.vertex_buffers = buffers;
    Ok(())
  }

  /// Set the index buffers. Every buffer must be shadowed.
  /// param buffers: The index buffers.
  /// return: The result.
  pub fn set_index_buffers(&mut self, buffers: Vec<HalaIndexBuffer>) -> Result<(), HalaModelError> {
    if let Some(index) = buffers.iter().position(|buffer| !buffer.is_shadowed()) {
      log::error!("Model index buffers must be shadowed, buffer {} is not.", index);
      return Err(HalaModelError::UnshadowedBuffer { kind: HalaBufferKind::Index, index: index as u32 });
    }
    for (geometry_index, geometry) in self.geometries.iter().enumerate() {
      for (lod, level) in geometry.lod_levels.iter().enumerate() {
        if let Some(level) = level {
          if let Err(err) = validate_lod_level(geometry_index as u32, lod as u32, level, usize::MAX, &buffers) {
            log::error!("Geometry {} does not fit the new index buffers: {}", geometry_index, err);
            return Err(err);
          }
        }
      }
    }
    self.begin_edit()?;
    self.retire_index_buffers();
    self.index_buffers = buffers;
    Ok(())
  }

  /// Set the number of geometries. New geometries get one unset LOD level.
  /// param num: The geometry count.
  /// return: The result.
  pub fn set_num_geometries(&mut self, num: usize) -> Result<(), HalaModelError> {
    self.begin_edit()?;
    self.geometries.resize_with(num, HalaGeometry::default);
    Ok(())
  }

  /// Set the number of LOD levels of a geometry.
  /// param index: The geometry index.
  /// param num: The LOD level count, at least one.
  /// return: The result.
  pub fn set_num_geometry_lod_levels(&mut self, index: usize, num: usize) -> Result<(), HalaModelError> {
    let count = self.geometries.len() as u32;
    if index >= self.geometries.len() {
      log::error!("Geometry index {} out of bounds.", index);
      return Err(HalaModelError::GeometryOutOfRange { index: index as u32, count });
    }
    if num == 0 {
      log::error!("Zero LOD levels not allowed.");
      return Err(HalaModelError::ZeroLodLevels(index as u32));
    }
    self.begin_edit()?;
    self.geometries[index].lod_levels.resize(num, None);
    Ok(())
  }

  /// Set one LOD level of a geometry.
  /// param index: The geometry index.
  /// param lod: The LOD level index.
  /// param level: The LOD level.
  /// return: The result.
  pub fn set_geometry(&mut self, index: usize, lod: usize, level: HalaLodLevel) -> Result<(), HalaModelError> {
    let geometry = self.geometries.get(index)
      .ok_or(HalaModelError::GeometryOutOfRange { index: index as u32, count: self.geometries.len() as u32 })
      .inspect_err(|_| log::error!("Geometry index {} out of bounds.", index))?;
    if lod >= geometry.num_lod_levels() {
      log::error!("LOD level index {} out of bounds.", lod);
      return Err(HalaModelError::LodLevelOutOfRange {
        geometry: index as u32,
        lod: lod as u32,
        count: geometry.num_lod_levels() as u32,
      });
    }
    validate_lod_level(index as u32, lod as u32, &level, self.vertex_buffers.len(), &self.index_buffers)
      .inspect_err(|err| log::error!("Invalid LOD level: {}", err))?;
    if !geometry.fits_lod_order(lod, &level) {
      log::error!("LOD distance {} breaks the order of geometry {}.", level.distance, index);
      return Err(HalaModelError::NonMonotonicLodDistances { geometry: index as u32, lod: lod as u32 });
    }
    self.begin_edit()?;
    self.geometries[index].lod_levels[lod] = Some(level);
    Ok(())
  }

  /// Set the center of a geometry.
  /// param index: The geometry index.
  /// param center: The center.
  /// return: The result.
  pub fn set_geometry_center(&mut self, index: usize, center: Vec3) -> Result<(), HalaModelError> {
    if index >= self.geometries.len() {
      log::error!("Geometry index {} out of bounds.", index);
      return Err(HalaModelError::GeometryOutOfRange { index: index as u32, count: self.geometries.len() as u32 });
    }
    self.begin_edit()?;
    self.geometries[index].center = center;
    Ok(())
  }

  /// Set the bone mapping of every geometry.
  /// param mappings: One skin slot to bone index mapping per geometry.
  /// return: The result.
  pub fn set_geometry_bone_mappings(&mut self, mappings: Vec<Vec<u32>>) -> Result<(), HalaModelError> {
    if mappings.len() > self.geometries.len() {
      log::error!("{} bone mappings given for {} geometries.", mappings.len(), self.geometries.len());
      return Err(HalaModelError::GeometryOutOfRange {
        index: self.geometries.len() as u32,
        count: self.geometries.len() as u32,
      });
    }
    for mapping in mappings.iter() {
      self.skeleton.validate_bone_mapping(mapping)
        .inspect_err(|err| log::error!("Invalid bone mapping: {}", err))?;
    }
    self.begin_edit()?;
    let mut mappings = mappings.into_iter();
    for geometry in self.geometries.iter_mut() {
      geometry.bone_mapping = mappings.next().unwrap_or_default();
    }
    Ok(())
  }

  /// Set the skeleton. Existing bone mappings must stay inside it.
  /// param skeleton: The skeleton.
  /// return: The result.
  pub fn set_skeleton(&mut self, skeleton: HalaSkeleton) -> Result<(), HalaModelError> {
    for geometry in self.geometries.iter() {
      skeleton.validate_bone_mapping(&geometry.bone_mapping)
        .inspect_err(|err| log::error!("Skeleton does not cover the bone mappings: {}", err))?;
    }
    self.begin_edit()?;
    self.skeleton = skeleton;
    Ok(())
  }

  /// Set the morphs. Every delta must reference an existing vertex.
  /// param morphs: The morphs.
  /// return: The result.
  pub fn set_morphs(&mut self, morphs: Vec<HalaModelMorph>) -> Result<(), HalaModelError> {
    for morph in morphs.iter() {
      morph.validate(&self.vertex_buffers)
        .inspect_err(|err| log::error!("Invalid morph: {}", err))?;
    }
    self.begin_edit()?;
    self.morphs = morphs;
    Ok(())
  }

  /// Set the bounding box.
  /// param bounding_box: The bounding box.
  /// return: The result.
  pub fn set_bounding_box(&mut self, bounding_box: HalaBoundingBox) -> Result<(), HalaModelError> {
    self.begin_edit()?;
    self.bounding_box = bounding_box;
    Ok(())
  }

  /// Upload every buffer that is not on the device yet.
  /// param device: The device.
  /// return: The result.
  pub fn upload_buffers(&mut self, device: &mut dyn HalaBufferDevice) -> Result<(), HalaModelError> {
    self.release_retired_buffers(device);
    let keep_shadow_data = self.config.keep_shadow_data;
    for buffer in self.vertex_buffers.iter_mut() {
      buffer.upload(device, keep_shadow_data)?;
    }
    for buffer in self.index_buffers.iter_mut() {
      buffer.upload(device, keep_shadow_data)?;
    }
    Ok(())
  }

  /// Get the vertex data of a buffer with morphs added at their weights.
  /// param handle: The vertex buffer.
  /// param weights: (morph index, weight) pairs.
  /// return: The morphed vertex bytes.
  pub fn morphed_vertex_data(
    &self,
    handle: HalaVertexBufferHandle,
    weights: &[(usize, f32)],
  ) -> Result<Vec<u8>, HalaModelError> {
    let buffer = self.vertex_buffer(handle)
      .ok_or(HalaModelError::DanglingBufferReference {
        geometry: u32::MAX,
        lod: u32::MAX,
        kind: HalaBufferKind::Vertex,
        index: handle.0,
        count: self.vertex_buffers.len() as u32,
      })?;
    let mut data = buffer.shadow_data()
      .ok_or(HalaModelError::UnshadowedBuffer { kind: HalaBufferKind::Vertex, index: handle.0 })?
      .to_vec();
    for &(morph_index, weight) in weights {
      match self.morphs.get(morph_index) {
        Some(morph) => morph.apply(handle.0, buffer.layout(), &mut data, weight),
        None => log::warn!("Morph {} does not exist in model \"{}\".", morph_index, self.name),
      }
    }
    Ok(data)
  }

  /// Estimate the memory used by the model.
  /// return: The size in bytes.
  pub fn memory_use(&self) -> usize {
    let mut memory_use = std::mem::size_of::<Self>();
    for buffer in self.vertex_buffers.iter() {
      memory_use += std::mem::size_of::<HalaVertexBuffer>() + buffer.data_size();
    }
    for buffer in self.index_buffers.iter() {
      memory_use += std::mem::size_of::<HalaIndexBuffer>() + buffer.data_size();
    }
    for geometry in self.geometries.iter() {
      memory_use += std::mem::size_of::<HalaGeometry>()
        + geometry.num_lod_levels() * std::mem::size_of::<Option<HalaLodLevel>>()
        + geometry.bone_mapping.len() * std::mem::size_of::<u32>();
    }
    for morph in self.morphs.iter() {
      memory_use += std::mem::size_of::<HalaModelMorph>() + morph.data_size();
    }
    memory_use += self.skeleton.bones().len() * std::mem::size_of::<super::skeleton::HalaBone>();
    memory_use
  }
}
