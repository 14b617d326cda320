use std::collections::BTreeMap;
use std::io::Read;

use glam::{
  Affine3A,
  Vec3A,
};

use crate::config::HalaModelConfig;
use crate::error::HalaModelError;
use crate::model::bounds::HalaBoundingBox;
use crate::model::buffer::{
  HalaVertexBuffer,
  HalaIndexBuffer,
  HalaVertexBufferHandle,
  HalaIndexBufferHandle,
};
use crate::model::geometry::{
  HalaGeometry,
  HalaLodLevel,
  HalaPrimitiveTopology,
};
use crate::model::model::{
  validate_lod_level,
  HalaModel,
  HalaModelState,
};
use crate::model::morph::{
  HalaModelMorph,
  HalaVertexBufferMorph,
};
use crate::model::skeleton::{
  HalaBone,
  HalaSkeleton,
  BONE_COLLISION_SPHERE,
  BONE_COLLISION_BOX,
};
use crate::model::vertex::{
  HalaVertexElement,
  HalaVertexLayout,
};
use super::device_uploader::{
  HalaBufferDevice,
  HalaDeviceBufferId,
};
use super::stream::HalaBinaryReader;

/// The file id of the container with a legacy vertex element mask.
pub const MODEL_FILE_ID_LEGACY: [u8; 4] = *b"UMDL";
/// The file id of the container with explicit vertex element lists.
pub const MODEL_FILE_ID: [u8; 4] = *b"UMD2";

/// How a load uploads its buffers.
pub enum HalaLoadMode<'a> {
  /// Upload every buffer to the device while parsing.
  Sync(&'a mut dyn HalaBufferDevice),
  /// Keep the bytes pending, end_load uploads them later on the device context.
  Async,
}

/// The ticket returned by begin_load and consumed by end_load.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HalaLoadHandle {
  generation: u64,
  is_async: bool,
}

impl HalaLoadHandle {
  pub fn is_async(&self) -> bool {
    self.is_async
  }
}

/// Everything parsed from a model stream.
pub(crate) struct HalaParsedModel {
  pub vertex_buffers: Vec<HalaVertexBuffer>,
  pub index_buffers: Vec<HalaIndexBuffer>,
  pub geometries: Vec<HalaGeometry>,
  pub morphs: Vec<HalaModelMorph>,
  pub skeleton: HalaSkeleton,
  pub bounding_box: HalaBoundingBox,
}

/// The model stream parser.
pub(crate) struct HalaModelLoader<'a, 'd, R: Read> {
  reader: HalaBinaryReader<R>,
  config: &'a HalaModelConfig,
  device: Option<&'d mut dyn HalaBufferDevice>,
  uploaded: Vec<HalaDeviceBufferId>,
}

/// The implementation of the model stream parser.
impl<'a, 'd, R: Read> HalaModelLoader<'a, 'd, R> {
  /// Create a parser.
  /// param reader: The byte source.
  /// param config: The options.
  /// param device: The device to upload to while parsing, None to keep the bytes pending.
  /// return: The parser.
  pub fn new(reader: R, config: &'a HalaModelConfig, device: Option<&'d mut dyn HalaBufferDevice>) -> Self {
    Self {
      reader: HalaBinaryReader::new(reader, config.max_buffer_bytes),
      config,
      device,
      uploaded: Vec::new(),
    }
  }

  /// Parse and validate a whole model.
  /// Buffers uploaded before a failure are released again.
  /// return: The parsed model.
  pub fn parse(mut self) -> Result<HalaParsedModel, HalaModelError> {
    let result = self.parse_model();
    if result.is_err() {
      if let Some(device) = self.device.as_deref_mut() {
        for id in self.uploaded.drain(..) {
          device.release_buffer(id);
        }
      }
    }
    result
  }

  fn parse_model(&mut self) -> Result<HalaParsedModel, HalaModelError> {
    let file_id = self.reader.read_file_id()?;
    let is_legacy = match file_id {
      MODEL_FILE_ID_LEGACY => true,
      MODEL_FILE_ID => false,
      _ => return Err(HalaModelError::UnrecognizedFormat(file_id)),
    };

    let num_vertex_buffers = self.reader.read_u32("vertex buffer count")?;
    let mut vertex_buffers = Vec::new();
    for _ in 0..num_vertex_buffers {
      vertex_buffers.push(self.read_vertex_buffer(is_legacy)?);
    }

    let num_index_buffers = self.reader.read_u32("index buffer count")?;
    let mut index_buffers = Vec::new();
    for _ in 0..num_index_buffers {
      index_buffers.push(self.read_index_buffer()?);
    }

    let num_geometries = self.reader.read_u32("geometry count")?;
    let mut geometries = Vec::new();
    for geometry_index in 0..num_geometries {
      geometries.push(self.read_geometry(geometry_index, &vertex_buffers, &index_buffers)?);
    }

    let num_morphs = self.reader.read_u32("morph count")?;
    let mut morphs = Vec::new();
    for _ in 0..num_morphs {
      let morph = self.read_morph()?;
      morph.validate(&vertex_buffers)?;
      morphs.push(morph);
    }

    let skeleton = self.read_skeleton()?;
    for geometry in geometries.iter() {
      skeleton.validate_bone_mapping(&geometry.bone_mapping)?;
    }

    let bounding_box = self.reader.read_bounding_box("bounding box")?;

    for (index, geometry) in geometries.iter_mut().enumerate() {
      match self.reader.try_read_vec3("geometry center")? {
        Some(center) => geometry.center = center,
        None => {
          log::warn!("Geometry centers missing from geometry {} on, defaulting to zero.", index);
          break;
        },
      }
    }

    Ok(HalaParsedModel {
      vertex_buffers,
      index_buffers,
      geometries,
      morphs,
      skeleton,
      bounding_box,
    })
  }

  fn payload_len(&self, count: u32, size: usize, what: &'static str) -> Result<usize, HalaModelError> {
    let len = count as u64 * size as u64;
    if len > self.config.max_buffer_bytes {
      return Err(HalaModelError::PayloadTooLarge { what, size: len, limit: self.config.max_buffer_bytes });
    }
    Ok(len as usize)
  }

  fn read_vertex_buffer(&mut self, is_legacy: bool) -> Result<HalaVertexBuffer, HalaModelError> {
    let vertex_count = self.reader.read_u32("vertex count")?;
    let layout = if is_legacy {
      HalaVertexLayout::from_legacy_mask(self.reader.read_u32("vertex element mask")?)
    } else {
      let num_elements = self.reader.read_u32("vertex element count")?;
      let mut elements = Vec::new();
      for _ in 0..num_elements {
        elements.push(HalaVertexElement::from_packed(self.reader.read_u32("vertex element")?)?);
      }
      HalaVertexLayout::new(elements)
    };
    let morph_range_start = self.reader.read_u32("morph range start")?;
    let morph_range_count = self.reader.read_u32("morph range count")?;
    let len = self.payload_len(vertex_count, layout.stride(), "vertex data")?;
    let data = self.reader.read_bytes(len, "vertex data")?;

    let mut buffer = match self.device.as_deref_mut() {
      Some(device) => {
        let mut buffer = HalaVertexBuffer::new(vertex_count, layout, data)?;
        buffer.upload(device, self.config.keep_shadow_data)?;
        self.uploaded.extend(buffer.device_buffer());
        buffer
      },
      None => HalaVertexBuffer::pending(vertex_count, layout, data)?,
    };
    buffer.set_morph_range(morph_range_start, morph_range_count);
    Ok(buffer)
  }

  fn read_index_buffer(&mut self) -> Result<HalaIndexBuffer, HalaModelError> {
    let index_count = self.reader.read_u32("index count")?;
    let index_size = self.reader.read_u32("index size")?;
    if index_size != 2 && index_size != 4 {
      return Err(HalaModelError::InvalidIndexSize(index_size));
    }
    let len = self.payload_len(index_count, index_size as usize, "index data")?;
    let data = self.reader.read_bytes(len, "index data")?;

    match self.device.as_deref_mut() {
      Some(device) => {
        let mut buffer = HalaIndexBuffer::new(index_count, index_size, data)?;
        buffer.upload(device, self.config.keep_shadow_data)?;
        self.uploaded.extend(buffer.device_buffer());
        Ok(buffer)
      },
      None => HalaIndexBuffer::pending(index_count, index_size, data),
    }
  }

  fn read_geometry(
    &mut self,
    geometry_index: u32,
    vertex_buffers: &[HalaVertexBuffer],
    index_buffers: &[HalaIndexBuffer],
  ) -> Result<HalaGeometry, HalaModelError> {
    let bone_mapping_count = self.reader.read_u32("bone mapping count")?;
    let mut bone_mapping = Vec::new();
    for _ in 0..bone_mapping_count {
      bone_mapping.push(self.reader.read_u32("bone mapping")?);
    }

    let num_lod_levels = self.reader.read_u32("LOD level count")?;
    if num_lod_levels == 0 {
      return Err(HalaModelError::ZeroLodLevels(geometry_index));
    }
    let mut lod_levels = Vec::new();
    for lod in 0..num_lod_levels {
      let level = HalaLodLevel {
        distance: self.reader.read_f32("LOD distance")?,
        topology: HalaPrimitiveTopology::from_u32(self.reader.read_u32("primitive topology")?)?,
        vertex_buffer: HalaVertexBufferHandle(self.reader.read_u32("vertex buffer reference")?),
        index_buffer: HalaIndexBufferHandle(self.reader.read_u32("index buffer reference")?),
        index_start: self.reader.read_u32("index start")?,
        index_count: self.reader.read_u32("index count")?,
      };
      validate_lod_level(geometry_index, lod, &level, vertex_buffers.len(), index_buffers)?;
      lod_levels.push(level);
    }

    let mut geometry = HalaGeometry::new(lod_levels);
    geometry.bone_mapping = bone_mapping;
    if self.config.validate_lod_distances {
      if let Some(lod) = geometry.first_non_monotonic_lod() {
        return Err(HalaModelError::NonMonotonicLodDistances { geometry: geometry_index, lod: lod as u32 });
      }
    }
    Ok(geometry)
  }

  fn read_morph(&mut self) -> Result<HalaModelMorph, HalaModelError> {
    let mut morph = HalaModelMorph::new(&self.reader.read_string("morph name")?);
    let num_buffers = self.reader.read_u32("morph buffer count")?;
    let mut buffers = BTreeMap::new();
    for _ in 0..num_buffers {
      let buffer_index = self.reader.read_u32("morph buffer index")?;
      let element_mask = self.reader.read_u32("morph element mask")?;
      let vertex_count = self.reader.read_u32("morph vertex count")?;
      let len = self.payload_len(vertex_count, HalaVertexBufferMorph::record_size(element_mask), "morph data")?;
      let data = self.reader.read_bytes(len, "morph data")?;
      buffers.insert(buffer_index, HalaVertexBufferMorph::decode(element_mask, &data));
    }
    morph.buffers = buffers;
    Ok(morph)
  }

  fn read_skeleton(&mut self) -> Result<HalaSkeleton, HalaModelError> {
    let num_bones = self.reader.read_u32("bone count")?;
    let mut bones = Vec::new();
    for index in 0..num_bones {
      let name = self.reader.read_string("bone name")?;
      let parent = self.reader.read_u32("bone parent")?;
      let initial_position = self.reader.read_vec3("bone position")?;
      let initial_rotation = self.reader.read_quat("bone rotation")?;
      let initial_scale = self.reader.read_vec3("bone scale")?;
      let mut rows = [0f32; 12];
      for value in rows.iter_mut() {
        *value = self.reader.read_f32("bone offset matrix")?;
      }
      let collision_mask = self.reader.read_u8("bone collision mask")?;
      let radius = if collision_mask & BONE_COLLISION_SPHERE != 0 {
        self.reader.read_f32("bone radius")?
      } else {
        0.0
      };
      let bounding_box = if collision_mask & BONE_COLLISION_BOX != 0 {
        self.reader.read_bounding_box("bone bounding box")?
      } else {
        HalaBoundingBox::default()
      };
      bones.push(HalaBone {
        name,
        parent: if parent == index { None } else { Some(parent) },
        initial_position,
        initial_rotation,
        initial_scale,
        offset_matrix: affine_from_rows(&rows),
        collision_mask,
        radius,
        bounding_box,
      });
    }
    HalaSkeleton::new(bones)
  }
}

/// Build an affine transform from a 3x4 row-major matrix.
pub(crate) fn affine_from_rows(rows: &[f32; 12]) -> Affine3A {
  Affine3A::from_cols(
    Vec3A::new(rows[0], rows[4], rows[8]),
    Vec3A::new(rows[1], rows[5], rows[9]),
    Vec3A::new(rows[2], rows[6], rows[10]),
    Vec3A::new(rows[3], rows[7], rows[11]),
  )
}

/// The two phase load implementation of the model.
impl HalaModel {
  /// Start loading the model from a stream, replacing its content.
  /// In sync mode the model is ready on return, in async mode end_load must follow.
  /// On failure the model is left empty.
  /// param reader: The byte source.
  /// param mode: How the buffers are uploaded.
  /// return: The handle to pass to end_load.
  pub fn begin_load<R: Read>(&mut self, reader: R, mode: HalaLoadMode<'_>) -> Result<HalaLoadHandle, HalaModelError> {
    self.load_generation += 1;
    self.reset();

    let (is_async, mut device) = match mode {
      HalaLoadMode::Sync(device) => (false, Some(device)),
      HalaLoadMode::Async => (true, None),
    };
    if let Some(device) = device.as_deref_mut() {
      self.release_retired_buffers(device);
    }
    let parsed = match HalaModelLoader::new(reader, &self.config, device).parse() {
      Ok(parsed) => parsed,
      Err(err) => {
        log::error!("Failed to load model \"{}\": {}", self.name, err);
        self.reset();
        return Err(err);
      },
    };

    self.vertex_buffers = parsed.vertex_buffers;
    self.index_buffers = parsed.index_buffers;
    self.geometries = parsed.geometries;
    self.morphs = parsed.morphs;
    self.skeleton = parsed.skeleton;
    self.bounding_box = parsed.bounding_box;
    self.state = if is_async { HalaModelState::PendingUpload } else { HalaModelState::Ready };
    log::debug!(
      "Model \"{}\" parsed: {} vertex buffers, {} index buffers, {} geometries, {} morphs, {} bones.",
      self.name,
      self.vertex_buffers.len(),
      self.index_buffers.len(),
      self.geometries.len(),
      self.morphs.len(),
      self.skeleton.num_bones(),
    );

    Ok(HalaLoadHandle {
      generation: self.load_generation,
      is_async,
    })
  }

  /// Finish an async load by uploading the pending buffers.
  /// This must run on the context owning the device. Finishing a sync load does nothing.
  /// param handle: The handle returned by begin_load.
  /// param device: The device.
  /// return: The result.
  pub fn end_load(&mut self, handle: HalaLoadHandle, device: &mut dyn HalaBufferDevice) -> Result<(), HalaModelError> {
    if handle.generation != self.load_generation {
      log::error!("Model \"{}\" got a load handle of a superseded load.", self.name);
      return Err(HalaModelError::StaleLoadHandle);
    }
    self.release_retired_buffers(device);
    if !handle.is_async {
      return Ok(());
    }
    if self.state != HalaModelState::PendingUpload {
      log::error!("Model \"{}\" has already been finalized.", self.name);
      return Err(HalaModelError::AlreadyFinalized);
    }

    if let Err(err) = self.upload_buffers(device) {
      log::error!("Failed to upload the buffers of model \"{}\": {}", self.name, err);
      self.reset();
      self.release_retired_buffers(device);
      return Err(err);
    }
    self.state = HalaModelState::Ready;
    log::debug!("Model \"{}\" finalized.", self.name);
    Ok(())
  }
}
