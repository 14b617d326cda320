mod common;

use std::fs::File;
use std::io::{
  BufReader,
  BufWriter,
};

use anyhow::Result;
use approx::assert_relative_eq;
use glam::Vec3;
use tempfile::tempdir;

use hala_model::prelude::*;

use common::{
  init_logger,
  sample_model,
  TriangleFile,
};

fn load(bytes: &[u8], config: HalaModelConfig) -> (HalaModel, Result<HalaLoadHandle, HalaModelError>) {
  let mut device = HalaHostDevice::new();
  let mut model = HalaModel::with_config("loaded", config);
  let result = model.begin_load(bytes, HalaLoadMode::Sync(&mut device));
  (model, result)
}

#[test]
fn save_then_load_through_a_file() -> Result<()> {
  let source = sample_model(HalaModelConfig::default());
  let dir = tempdir()?;
  let path = dir.path().join("sample.mdl");
  source.save(BufWriter::new(File::create(&path)?), None)?;

  let mut device = HalaHostDevice::new();
  let mut loaded = HalaModel::new("sample");
  loaded.begin_load(BufReader::new(File::open(&path)?), HalaLoadMode::Sync(&mut device))?;
  assert!(loaded.is_ready());
  assert_eq!(device.buffer_count(), 4);

  assert_eq!(loaded.vertex_buffers().len(), source.vertex_buffers().len());
  for (a, b) in loaded.vertex_buffers().iter().zip(source.vertex_buffers()) {
    assert_eq!(a.layout(), b.layout());
    assert_eq!(a.shadow_data(), b.shadow_data());
    assert_eq!(a.morph_range_start(), b.morph_range_start());
    assert_eq!(a.morph_range_count(), b.morph_range_count());
    assert!(matches!(a.state(), HalaBufferState::Uploaded(_)));
  }
  for (a, b) in loaded.index_buffers().iter().zip(source.index_buffers()) {
    assert_eq!(a.index_size(), b.index_size());
    assert_eq!(a.shadow_data(), b.shadow_data());
  }
  assert_eq!(loaded.geometries(), source.geometries());
  assert_eq!(loaded.skeleton(), source.skeleton());
  assert_eq!(loaded.morphs(), source.morphs());
  assert_eq!(loaded.bounding_box(), source.bounding_box());
  Ok(())
}

#[test]
fn saved_bytes_are_stable() -> Result<()> {
  let source = sample_model(HalaModelConfig::default());
  let mut first = Vec::new();
  source.save(&mut first, None)?;
  assert_eq!(&first[..4], b"UMD2");

  let (loaded, result) = load(&first, HalaModelConfig::default());
  result?;
  let mut second = Vec::new();
  loaded.save(&mut second, None)?;
  assert_eq!(first, second);
  Ok(())
}

#[test]
fn legacy_element_mask_files_load() -> Result<()> {
  let bytes = TriangleFile { legacy: true, ..Default::default() }.bytes();
  let (model, result) = load(&bytes, HalaModelConfig::default());
  result?;

  let layout = model.vertex_buffers()[0].layout();
  assert_eq!(layout.stride(), 12);
  assert!(layout.has_element(HalaVertexElementSemantic::Position, 0));
  assert_eq!(model.geometry(0, 0).map(|level| level.index_count), Some(3));
  assert_eq!(model.geometry_center(0), Some(Vec3::new(0.25, 0.25, 0.0)));

  // Only the explicit element list form is written back.
  let mut saved = Vec::new();
  model.save(&mut saved, None)?;
  assert_eq!(&saved[..4], b"UMD2");
  Ok(())
}

#[test]
fn unknown_file_id_is_rejected() {
  let mut bytes = TriangleFile::default().bytes();
  bytes[..4].copy_from_slice(b"GLTF");
  let (model, result) = load(&bytes, HalaModelConfig::default());
  assert!(matches!(result, Err(HalaModelError::UnrecognizedFormat(id)) if &id == b"GLTF"));
  assert_eq!(model.state(), HalaModelState::Empty);
}

#[test]
fn dangling_vertex_buffer_reference_empties_the_model() -> Result<()> {
  init_logger();
  let mut device = HalaHostDevice::new();
  let mut model = HalaModel::new("reused");
  model.begin_load(TriangleFile::default().bytes().as_slice(), HalaLoadMode::Sync(&mut device))?;
  assert_eq!(model.num_geometries(), 1);

  let bytes = TriangleFile { vertex_buffer_ref: 1, ..Default::default() }.bytes();
  let err = model.begin_load(bytes.as_slice(), HalaLoadMode::Sync(&mut device)).unwrap_err();
  assert!(matches!(err, HalaModelError::DanglingBufferReference {
    geometry: 0,
    lod: 0,
    kind: HalaBufferKind::Vertex,
    index: 1,
    count: 1,
  }));
  assert!(err.is_fatal());
  assert_eq!(model.state(), HalaModelState::Empty);
  assert_eq!(model.num_geometries(), 0);
  assert!(model.vertex_buffers().is_empty());

  // The model stays reusable after a failed load.
  model.begin_load(TriangleFile::default().bytes().as_slice(), HalaLoadMode::Sync(&mut device))?;
  assert!(model.is_ready());
  Ok(())
}

#[test]
fn truncated_streams_are_rejected() {
  let bytes = TriangleFile::default().bytes();
  // Cut inside the bounding box as well as early in the header.
  for len in [2, 6, 30, 70, bytes.len() - 13] {
    let (model, result) = load(&bytes[..len], HalaModelConfig::default());
    assert!(matches!(result, Err(HalaModelError::TruncatedStream(_))), "cut at {}", len);
    assert_eq!(model.state(), HalaModelState::Empty);
  }
}

#[test]
fn missing_geometry_centers_default_to_zero() -> Result<()> {
  let bytes = TriangleFile { with_center: false, ..Default::default() }.bytes();
  let (model, result) = load(&bytes, HalaModelConfig::default());
  result?;
  assert_eq!(model.geometry_center(0), Some(Vec3::ZERO));

  let mut partial = bytes.clone();
  partial.extend_from_slice(&1.0f32.to_le_bytes());
  let (_, result) = load(&partial, HalaModelConfig::default());
  assert!(matches!(result, Err(HalaModelError::TruncatedStream(_))));
  Ok(())
}

#[test]
fn zero_lod_levels_are_rejected() {
  let bytes = TriangleFile { lod_distances: vec![], ..Default::default() }.bytes();
  let (model, result) = load(&bytes, HalaModelConfig::default());
  assert!(matches!(result, Err(HalaModelError::ZeroLodLevels(0))));
  assert_eq!(model.state(), HalaModelState::Empty);
}

#[test]
fn decreasing_lod_distances_are_rejected_by_default() {
  let bytes = TriangleFile { lod_distances: vec![0.0, 50.0, 10.0], ..Default::default() }.bytes();
  let (_, result) = load(&bytes, HalaModelConfig::default());
  assert!(matches!(result, Err(HalaModelError::NonMonotonicLodDistances { geometry: 0, lod: 2 })));
}

#[test]
fn non_finite_lod_distances_are_rejected() {
  let bytes = TriangleFile { lod_distances: vec![0.0, f32::NAN, 5.0], ..Default::default() }.bytes();
  let (model, result) = load(&bytes, HalaModelConfig::default());
  assert!(matches!(result, Err(HalaModelError::InvalidLodDistance { geometry: 0, lod: 1, .. })));
  assert_eq!(model.state(), HalaModelState::Empty);

  let config = HalaModelConfig { validate_lod_distances: false, ..Default::default() };
  let (_, result) = load(&bytes, config);
  assert!(matches!(result, Err(HalaModelError::InvalidLodDistance { .. })));
}

#[test]
fn decreasing_lod_distances_load_when_validation_is_off() -> Result<()> {
  let bytes = TriangleFile { lod_distances: vec![0.0, 50.0, 10.0], ..Default::default() }.bytes();
  let config = HalaModelConfig { validate_lod_distances: false, ..Default::default() };
  let (model, result) = load(&bytes, config);
  result?;
  assert_eq!(model.num_geometry_lod_levels(0), 3);
  assert_relative_eq!(model.geometry(0, 2).map(|level| level.distance).unwrap_or_default(), 10.0);
  Ok(())
}

#[test]
fn morph_vertex_out_of_range_is_rejected() -> Result<()> {
  let bytes = TriangleFile { morph_vertex: Some(3), ..Default::default() }.bytes();
  let (model, result) = load(&bytes, HalaModelConfig::default());
  assert!(matches!(result, Err(HalaModelError::MorphIndexOutOfRange { buffer: 0, vertex: 3, count: 3, .. })));
  assert!(model.morphs().is_empty());

  let bytes = TriangleFile { morph_vertex: Some(2), ..Default::default() }.bytes();
  let (model, result) = load(&bytes, HalaModelConfig::default());
  result?;
  assert_eq!(model.morph_by_name("bulge").map(|morph| morph.buffers.len()), Some(1));
  Ok(())
}

#[test]
fn bone_mapping_must_stay_inside_the_skeleton() -> Result<()> {
  let bytes = TriangleFile { bone_mapping: vec![0, 2], num_bones: 2, ..Default::default() }.bytes();
  let (_, result) = load(&bytes, HalaModelConfig::default());
  assert!(matches!(result, Err(HalaModelError::BoneIndexOutOfRange { index: 2, count: 2 })));

  let bytes = TriangleFile { bone_mapping: vec![1, 0], num_bones: 2, ..Default::default() }.bytes();
  let (model, result) = load(&bytes, HalaModelConfig::default());
  result?;
  assert_eq!(model.skeleton().root_bone_index(), Some(0));
  assert_eq!(model.skeleton().bone(1).and_then(|bone| bone.parent), Some(0));
  assert_eq!(model.geometry_bone_mapping(0), Some(&[1u32, 0][..]));
  Ok(())
}

#[test]
fn oversized_payload_declarations_fail_before_allocation() {
  let bytes = TriangleFile::default().bytes();
  let config = HalaModelConfig { max_buffer_bytes: 16, ..Default::default() };
  let (_, result) = load(&bytes, config);
  assert!(matches!(result, Err(HalaModelError::PayloadTooLarge { what: "vertex data", size: 36, limit: 16 })));

  // Every payload byte is present, only the limit is exceeded.
  let config = HalaModelConfig { max_buffer_bytes: 36, ..Default::default() };
  let (_, result) = load(&bytes, config);
  assert!(result.is_ok());
}

#[test]
fn save_without_shadow_data_reads_back_from_the_device() -> Result<()> {
  let config = HalaModelConfig { keep_shadow_data: false, ..Default::default() };
  let mut device = HalaHostDevice::new();
  let mut model = HalaModel::with_config("gpu only", config);
  model.begin_load(TriangleFile::default().bytes().as_slice(), HalaLoadMode::Sync(&mut device))?;
  assert!(!model.vertex_buffers()[0].is_shadowed());

  let mut saved = Vec::new();
  model.save(&mut saved, Some(&device as &dyn HalaBufferDevice))?;
  assert_eq!(saved, TriangleFile::default().bytes());

  let mut unsaved = Vec::new();
  let err = model.save(&mut unsaved, None).unwrap_err();
  assert!(matches!(err, HalaModelError::UnshadowedBuffer { kind: HalaBufferKind::Vertex, index: 0 }));
  assert!(unsaved.is_empty());
  Ok(())
}
