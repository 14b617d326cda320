use std::collections::BTreeMap;

use crate::error::HalaModelError;
use crate::model::vertex::HalaVertexLayout;

/// The identifier of a device-resident buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalaDeviceBufferId(pub u64);

/// The context that owns device buffer creation.
/// Uploads must run on the execution context owning the implementation.
pub trait HalaBufferDevice {
  /// Create a device vertex buffer from the bytes.
  /// param layout: The vertex layout.
  /// param vertex_count: The vertex count.
  /// param data: The vertex bytes, vertex_count * stride long.
  /// return: The device buffer id.
  fn create_vertex_buffer(
    &mut self,
    layout: &HalaVertexLayout,
    vertex_count: u32,
    data: &[u8],
  ) -> Result<HalaDeviceBufferId, HalaModelError>;

  /// Create a device index buffer from the bytes.
  /// param index_size: The index width in bytes.
  /// param index_count: The index count.
  /// param data: The index bytes, index_count * index_size long.
  /// return: The device buffer id.
  fn create_index_buffer(
    &mut self,
    index_size: u32,
    index_count: u32,
    data: &[u8],
  ) -> Result<HalaDeviceBufferId, HalaModelError>;

  /// Read the bytes of a device buffer back to the CPU.
  /// param id: The device buffer id.
  /// return: The bytes, or None if the buffer can not be read back.
  fn read_buffer(&self, id: HalaDeviceBufferId) -> Option<Vec<u8>>;

  /// Free a device buffer. Releasing an unknown id does nothing.
  /// param id: The device buffer id.
  fn release_buffer(&mut self, id: HalaDeviceBufferId);
}

/// A device that keeps its buffers in host memory.
pub struct HalaHostDevice {
  buffers: BTreeMap<HalaDeviceBufferId, Vec<u8>>,
  next_id: u64,
  readable: bool,
}

impl Default for HalaHostDevice {
  fn default() -> Self {
    Self::new()
  }
}

/// The implementation of the host device.
impl HalaHostDevice {
  /// Create a new host device whose buffers can be read back.
  /// return: The host device.
  pub fn new() -> Self {
    Self {
      buffers: BTreeMap::new(),
      next_id: 1,
      readable: true,
    }
  }

  /// Create a new host device whose buffers can not be read back, like GPU-only memory.
  /// return: The host device.
  pub fn write_only() -> Self {
    Self {
      readable: false,
      ..Self::new()
    }
  }

  /// Allow or deny read back of the buffers.
  /// param readable: Whether read back succeeds.
  pub fn set_readable(&mut self, readable: bool) {
    self.readable = readable;
  }

  /// Get the number of live buffers.
  /// return: The buffer count.
  pub fn buffer_count(&self) -> usize {
    self.buffers.len()
  }

  /// Get the bytes of a buffer regardless of readability.
  /// param id: The device buffer id.
  /// return: The bytes.
  pub fn buffer_data(&self, id: HalaDeviceBufferId) -> Option<&[u8]> {
    self.buffers.get(&id).map(|data| data.as_slice())
  }

  /// Release a buffer.
  /// param id: The device buffer id.
  /// return: True if the buffer existed.
  pub fn release(&mut self, id: HalaDeviceBufferId) -> bool {
    self.buffers.remove(&id).is_some()
  }

  fn store(&mut self, data: &[u8]) -> HalaDeviceBufferId {
    let id = HalaDeviceBufferId(self.next_id);
    self.next_id += 1;
    self.buffers.insert(id, data.to_vec());
    id
  }
}

impl HalaBufferDevice for HalaHostDevice {
  fn create_vertex_buffer(
    &mut self,
    layout: &HalaVertexLayout,
    vertex_count: u32,
    data: &[u8],
  ) -> Result<HalaDeviceBufferId, HalaModelError> {
    let expected = vertex_count as usize * layout.stride();
    if data.len() != expected {
      return Err(HalaModelError::Device(
        format!("Vertex data is {} bytes, expected {}.", data.len(), expected)));
    }
    let id = self.store(data);
    log::debug!("Host vertex buffer {:?} created with {} vertices.", id, vertex_count);
    Ok(id)
  }

  fn create_index_buffer(
    &mut self,
    index_size: u32,
    index_count: u32,
    data: &[u8],
  ) -> Result<HalaDeviceBufferId, HalaModelError> {
    let expected = index_count as usize * index_size as usize;
    if data.len() != expected {
      return Err(HalaModelError::Device(
        format!("Index data is {} bytes, expected {}.", data.len(), expected)));
    }
    let id = self.store(data);
    log::debug!("Host index buffer {:?} created with {} indices.", id, index_count);
    Ok(id)
  }

  fn read_buffer(&self, id: HalaDeviceBufferId) -> Option<Vec<u8>> {
    if !self.readable {
      return None;
    }
    self.buffers.get(&id).cloned()
  }

  fn release_buffer(&mut self, id: HalaDeviceBufferId) {
    if self.release(id) {
      log::debug!("Host buffer {:?} released.", id);
    }
  }
}
