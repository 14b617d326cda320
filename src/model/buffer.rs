use crate::error::{
  HalaModelError,
  HalaBufferKind,
};
use super::vertex::HalaVertexLayout;
use super::loader::device_uploader::{
  HalaBufferDevice,
  HalaDeviceBufferId,
};

/// The handle of a vertex buffer inside its model.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalaVertexBufferHandle(pub u32);

/// The handle of an index buffer inside its model.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalaIndexBufferHandle(pub u32);

impl HalaVertexBufferHandle {
  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

impl HalaIndexBufferHandle {
  pub fn index(&self) -> usize {
    self.0 as usize
  }
}

/// The upload state of a buffer.
/// PendingBytes is the load-time descriptor of an asynchronous load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HalaBufferState {
  Unloaded,
  PendingBytes(Vec<u8>),
  Uploaded(HalaDeviceBufferId),
}

/// The bytes and device state shared by vertex and index buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HalaBufferStorage {
  shadow_data: Option<Vec<u8>>,
  state: HalaBufferState,
}

impl HalaBufferStorage {
  fn shadowed(data: Vec<u8>) -> Self {
    Self {
      shadow_data: Some(data),
      state: HalaBufferState::Unloaded,
    }
  }

  fn pending(data: Vec<u8>) -> Self {
    Self {
      shadow_data: None,
      state: HalaBufferState::PendingBytes(data),
    }
  }

  fn upload<F>(&mut self, keep_shadow_data: bool, create: F) -> Result<(), HalaModelError>
  where
    F: FnOnce(&[u8]) -> Result<HalaDeviceBufferId, HalaModelError>,
  {
    match std::mem::replace(&mut self.state, HalaBufferState::Unloaded) {
      HalaBufferState::PendingBytes(bytes) => {
        match create(&bytes) {
          Ok(id) => {
            self.state = HalaBufferState::Uploaded(id);
            self.shadow_data = if keep_shadow_data { Some(bytes) } else { None };
            Ok(())
          },
          Err(err) => {
            self.state = HalaBufferState::PendingBytes(bytes);
            Err(err)
          },
        }
      },
      HalaBufferState::Unloaded => {
        let id = match self.shadow_data.as_deref() {
          Some(bytes) => create(bytes)?,
          None => return Err(HalaModelError::Device("No bytes to upload.".to_string())),
        };
        self.state = HalaBufferState::Uploaded(id);
        if !keep_shadow_data {
          self.shadow_data = None;
        }
        Ok(())
      },
      uploaded @ HalaBufferState::Uploaded(_) => {
        self.state = uploaded;
        Ok(())
      },
    }
  }

  fn device_buffer(&self) -> Option<HalaDeviceBufferId> {
    match self.state {
      HalaBufferState::Uploaded(id) => Some(id),
      _ => None,
    }
  }

  fn release(&mut self, device: &mut dyn HalaBufferDevice) -> bool {
    match self.device_buffer() {
      Some(id) => {
        device.release_buffer(id);
        self.state = HalaBufferState::Unloaded;
        true
      },
      None => false,
    }
  }

  fn read_back(&self, device: &dyn HalaBufferDevice, expected_len: usize) -> Option<Vec<u8>> {
    if let Some(data) = self.shadow_data.as_ref() {
      return Some(data.clone());
    }
    match &self.state {
      HalaBufferState::Uploaded(id) => device.read_buffer(*id)
        .filter(|data| data.len() == expected_len),
      HalaBufferState::PendingBytes(data) => Some(data.clone()),
      HalaBufferState::Unloaded => None,
    }
  }
}

fn check_size(kind: HalaBufferKind, expected: usize, actual: usize) -> Result<(), HalaModelError> {
  if expected != actual {
    return Err(HalaModelError::InvalidBufferSize { kind, expected, actual });
  }
  Ok(())
}

/// A vertex buffer: a vertex count, the layout that defines the stride and the vertex bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalaVertexBuffer {
  vertex_count: u32,
  layout: HalaVertexLayout,
  morph_range_start: u32,
  morph_range_count: u32,
  storage: HalaBufferStorage,
}

/// The implementation of the vertex buffer.
impl HalaVertexBuffer {
  /// Create a shadowed vertex buffer that is not uploaded yet.
  /// param vertex_count: The vertex count.
  /// param layout: The vertex layout.
  /// param data: The vertex bytes, vertex_count * stride long.
  /// return: The vertex buffer.
  pub fn new(vertex_count: u32, layout: HalaVertexLayout, data: Vec<u8>) -> Result<Self, HalaModelError> {
    check_size(HalaBufferKind::Vertex, vertex_count as usize * layout.stride(), data.len())?;
    Ok(Self {
      vertex_count,
      layout,
      morph_range_start: 0,
      morph_range_count: 0,
      storage: HalaBufferStorage::shadowed(data),
    })
  }

  /// Create a vertex buffer whose bytes wait for the finalize step.
  /// param vertex_count: The vertex count.
  /// param layout: The vertex layout.
  /// param data: The vertex bytes, vertex_count * stride long.
  /// return: The vertex buffer.
  pub fn pending(vertex_count: u32, layout: HalaVertexLayout, data: Vec<u8>) -> Result<Self, HalaModelError> {
    check_size(HalaBufferKind::Vertex, vertex_count as usize * layout.stride(), data.len())?;
    Ok(Self {
      vertex_count,
      layout,
      morph_range_start: 0,
      morph_range_count: 0,
      storage: HalaBufferStorage::pending(data),
    })
  }

  pub fn vertex_count(&self) -> u32 {
    self.vertex_count
  }

  pub fn layout(&self) -> &HalaVertexLayout {
    &self.layout
  }

  pub fn stride(&self) -> usize {
    self.layout.stride()
  }

  /// Get the payload size in bytes.
  /// return: vertex_count * stride.
  pub fn data_size(&self) -> usize {
    self.vertex_count as usize * self.stride()
  }

  pub fn morph_range_start(&self) -> u32 {
    self.morph_range_start
  }

  pub fn morph_range_count(&self) -> u32 {
    self.morph_range_count
  }

  /// Set the vertex range touched by morphs.
  /// param start: The first vertex.
  /// param count: The vertex count.
  pub fn set_morph_range(&mut self, start: u32, count: u32) {
    self.morph_range_start = start;
    self.morph_range_count = count;
  }

  pub fn is_shadowed(&self) -> bool {
    self.storage.shadow_data.is_some()
  }

  pub fn shadow_data(&self) -> Option<&[u8]> {
    self.storage.shadow_data.as_deref()
  }

  pub fn shadow_data_mut(&mut self) -> Option<&mut [u8]> {
    self.storage.shadow_data.as_deref_mut()
  }

  pub fn state(&self) -> &HalaBufferState {
    &self.storage.state
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.storage.state, HalaBufferState::PendingBytes(_))
  }

  /// Upload the bytes to the device. Uploading an uploaded buffer does nothing.
  /// param device: The device.
  /// param keep_shadow_data: Whether to keep the CPU-side copy.
  /// return: The result.
  pub fn upload(&mut self, device: &mut dyn HalaBufferDevice, keep_shadow_data: bool) -> Result<(), HalaModelError> {
    let layout = &self.layout;
    let vertex_count = self.vertex_count;
    self.storage.upload(keep_shadow_data, |data| device.create_vertex_buffer(layout, vertex_count, data))
  }

  /// Get the device buffer of an uploaded buffer.
  /// return: The device buffer id, or None if not uploaded.
  pub fn device_buffer(&self) -> Option<HalaDeviceBufferId> {
    self.storage.device_buffer()
  }

  /// Free the device copy. An unshadowed buffer keeps no bytes afterwards.
  /// param device: The device holding the buffer.
  /// return: True if a device buffer was freed.
  pub fn release(&mut self, device: &mut dyn HalaBufferDevice) -> bool {
    self.storage.release(device)
  }

  /// Get a copy of the bytes, from the shadow copy or the device.
  /// param device: The device holding the uploaded buffer.
  /// return: The bytes, or None if neither is available.
  pub fn read_back(&self, device: &dyn HalaBufferDevice) -> Option<Vec<u8>> {
    self.storage.read_back(device, self.data_size())
  }

  /// Create a shadowed buffer with the same shape holding the bytes.
  /// param data: The bytes.
  /// return: The new buffer.
  pub(crate) fn with_same_shape(&self, data: Vec<u8>) -> Result<Self, HalaModelError> {
    let mut buffer = Self::new(self.vertex_count, self.layout.clone(), data)?;
    buffer.set_morph_range(self.morph_range_start, self.morph_range_count);
    Ok(buffer)
  }
}

/// An index buffer: an index count, an index width of 2 or 4 bytes and the index bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HalaIndexBuffer {
  index_count: u32,
  index_size: u32,
  storage: HalaBufferStorage,
}

/// The implementation of the index buffer.
impl HalaIndexBuffer {
  /// Create a shadowed index buffer that is not uploaded yet.
  /// param index_count: The index count.
  /// param index_size: The index width, 2 or 4.
  /// param data: The index bytes, index_count * index_size long.
  /// return: The index buffer.
  pub fn new(index_count: u32, index_size: u32, data: Vec<u8>) -> Result<Self, HalaModelError> {
    Self::check_index_size(index_size)?;
    check_size(HalaBufferKind::Index, index_count as usize * index_size as usize, data.len())?;
    Ok(Self {
      index_count,
      index_size,
      storage: HalaBufferStorage::shadowed(data),
    })
  }

  /// Create an index buffer whose bytes wait for the finalize step.
  /// param index_count: The index count.
  /// param index_size: The index width, 2 or 4.
  /// param data: The index bytes, index_count * index_size long.
  /// return: The index buffer.
  pub fn pending(index_count: u32, index_size: u32, data: Vec<u8>) -> Result<Self, HalaModelError> {
    Self::check_index_size(index_size)?;
    check_size(HalaBufferKind::Index, index_count as usize * index_size as usize, data.len())?;
    Ok(Self {
      index_count,
      index_size,
      storage: HalaBufferStorage::pending(data),
    })
  }

  /// Create a shadowed 16-bit index buffer.
  /// param indices: The indices.
  /// return: The index buffer.
  pub fn from_u16(indices: &[u16]) -> Self {
    let data = indices.iter().flat_map(|index| index.to_le_bytes()).collect();
    Self {
      index_count: indices.len() as u32,
      index_size: 2,
      storage: HalaBufferStorage::shadowed(data),
    }
  }

  /// Create a shadowed 32-bit index buffer.
  /// param indices: The indices.
  /// return: The index buffer.
  pub fn from_u32(indices: &[u32]) -> Self {
    let data = indices.iter().flat_map(|index| index.to_le_bytes()).collect();
    Self {
      index_count: indices.len() as u32,
      index_size: 4,
      storage: HalaBufferStorage::shadowed(data),
    }
  }

  fn check_index_size(index_size: u32) -> Result<(), HalaModelError> {
    match index_size {
      2 | 4 => Ok(()),
      _ => Err(HalaModelError::InvalidIndexSize(index_size)),
    }
  }

  pub fn index_count(&self) -> u32 {
    self.index_count
  }

  pub fn index_size(&self) -> u32 {
    self.index_size
  }

  pub fn data_size(&self) -> usize {
    self.index_count as usize * self.index_size as usize
  }

  pub fn is_shadowed(&self) -> bool {
    self.storage.shadow_data.is_some()
  }

  pub fn shadow_data(&self) -> Option<&[u8]> {
    self.storage.shadow_data.as_deref()
  }

  pub fn shadow_data_mut(&mut self) -> Option<&mut [u8]> {
    self.storage.shadow_data.as_deref_mut()
  }

  pub fn state(&self) -> &HalaBufferState {
    &self.storage.state
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.storage.state, HalaBufferState::PendingBytes(_))
  }

  /// Read one index from the shadow copy.
  /// param position: The position in the buffer.
  /// return: The index value.
  pub fn index(&self, position: u32) -> Option<u32> {
    if position >= self.index_count {
      return None;
    }
    let data = self.shadow_data()?;
    let offset = position as usize * self.index_size as usize;
    match self.index_size {
      2 => Some(u16::from_le_bytes([data[offset], data[offset + 1]]) as u32),
      _ => Some(u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])),
    }
  }

  /// Upload the bytes to the device. Uploading an uploaded buffer does nothing.
  /// param device: The device.
  /// param keep_shadow_data: Whether to keep the CPU-side copy.
  /// return: The result.
  pub fn upload(&mut self, device: &mut dyn HalaBufferDevice, keep_shadow_data: bool) -> Result<(), HalaModelError> {
    let index_size = self.index_size;
    let index_count = self.index_count;
    self.storage.upload(keep_shadow_data, |data| device.create_index_buffer(index_size, index_count, data))
  }

  /// Get the device buffer of an uploaded buffer.
  /// return: The device buffer id, or None if not uploaded.
  pub fn device_buffer(&self) -> Option<HalaDeviceBufferId> {
    self.storage.device_buffer()
  }

  /// Free the device copy. An unshadowed buffer keeps no bytes afterwards.
  /// param device: The device holding the buffer.
  /// return: True if a device buffer was freed.
  pub fn release(&mut self, device: &mut dyn HalaBufferDevice) -> bool {
    self.storage.release(device)
  }

  /// Get a copy of the bytes, from the shadow copy or the device.
  /// param device: The device holding the uploaded buffer.
  /// return: The bytes, or None if neither is available.
  pub fn read_back(&self, device: &dyn HalaBufferDevice) -> Option<Vec<u8>> {
    self.storage.read_back(device, self.data_size())
  }

  pub(crate) fn with_same_shape(&self, data: Vec<u8>) -> Result<Self, HalaModelError> {
    Self::new(self.index_count, self.index_size, data)
  }
}
