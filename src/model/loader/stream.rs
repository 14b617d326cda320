use std::io::{
  ErrorKind,
  Read,
  Write,
};

use glam::{
  Quat,
  Vec3,
};

use crate::error::HalaModelError;
use crate::model::bounds::HalaBoundingBox;

fn map_read_error(err: std::io::Error, what: &'static str) -> HalaModelError {
  if err.kind() == ErrorKind::UnexpectedEof {
    HalaModelError::TruncatedStream(what)
  } else {
    HalaModelError::Io(err)
  }
}

/// A little-endian reader of the model container.
pub struct HalaBinaryReader<R: Read> {
  reader: R,
  max_bytes: u64,
}

/// The implementation of the binary reader.
impl<R: Read> HalaBinaryReader<R> {
  /// Create a new reader.
  /// param reader: The byte source.
  /// param max_bytes: The largest byte payload a single declaration may ask for.
  /// return: The reader.
  pub fn new(reader: R, max_bytes: u64) -> Self {
    Self { reader, max_bytes }
  }

  fn read_array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], HalaModelError> {
    let mut bytes = [0u8; N];
    self.reader.read_exact(&mut bytes).map_err(|err| map_read_error(err, what))?;
    Ok(bytes)
  }

  pub fn read_file_id(&mut self) -> Result<[u8; 4], HalaModelError> {
    self.read_array::<4>("file id")
  }

  pub fn read_u8(&mut self, what: &'static str) -> Result<u8, HalaModelError> {
    Ok(self.read_array::<1>(what)?[0])
  }

  pub fn read_u32(&mut self, what: &'static str) -> Result<u32, HalaModelError> {
    Ok(u32::from_le_bytes(self.read_array::<4>(what)?))
  }

  pub fn read_f32(&mut self, what: &'static str) -> Result<f32, HalaModelError> {
    Ok(f32::from_le_bytes(self.read_array::<4>(what)?))
  }

  pub fn read_vec3(&mut self, what: &'static str) -> Result<Vec3, HalaModelError> {
    Ok(Vec3::new(self.read_f32(what)?, self.read_f32(what)?, self.read_f32(what)?))
  }

  /// Read a rotation stored as w, x, y, z.
  pub fn read_quat(&mut self, what: &'static str) -> Result<Quat, HalaModelError> {
    let w = self.read_f32(what)?;
    let x = self.read_f32(what)?;
    let y = self.read_f32(what)?;
    let z = self.read_f32(what)?;
    Ok(Quat::from_xyzw(x, y, z, w))
  }

  pub fn read_bounding_box(&mut self, what: &'static str) -> Result<HalaBoundingBox, HalaModelError> {
    let min = self.read_vec3(what)?;
    let max = self.read_vec3(what)?;
    Ok(HalaBoundingBox::new(min, max))
  }

  /// Read a u32 length prefixed UTF-8 string.
  pub fn read_string(&mut self, what: &'static str) -> Result<String, HalaModelError> {
    let len = self.read_u32(what)? as usize;
    let bytes = self.read_bytes(len, what)?;
    String::from_utf8(bytes)
      .map_err(|err| HalaModelError::Io(std::io::Error::new(ErrorKind::InvalidData, err)))
  }

  /// Read a byte payload. Declarations above the byte limit fail before allocation.
  /// param len: The payload length.
  /// param what: The payload description for errors.
  /// return: The bytes.
  pub fn read_bytes(&mut self, len: usize, what: &'static str) -> Result<Vec<u8>, HalaModelError> {
    if len as u64 > self.max_bytes {
      return Err(HalaModelError::PayloadTooLarge { what, size: len as u64, limit: self.max_bytes });
    }
    let mut bytes = Vec::with_capacity(len);
    (&mut self.reader).take(len as u64).read_to_end(&mut bytes)
      .map_err(|err| map_read_error(err, what))?;
    if bytes.len() != len {
      return Err(HalaModelError::TruncatedStream(what));
    }
    Ok(bytes)
  }

  /// Read a vector, or None if the stream ends before its first byte.
  /// A vector cut short is still a truncated stream.
  pub fn try_read_vec3(&mut self, what: &'static str) -> Result<Option<Vec3>, HalaModelError> {
    let mut bytes = [0u8; 12];
    let mut filled = 0;
    while filled < bytes.len() {
      match self.reader.read(&mut bytes[filled..]) {
        Ok(0) => break,
        Ok(n) => filled += n,
        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
        Err(err) => return Err(map_read_error(err, what)),
      }
    }
    match filled {
      0 => Ok(None),
      12 => {
        let component = |i: usize| f32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]);
        Ok(Some(Vec3::new(component(0), component(1), component(2))))
      },
      _ => Err(HalaModelError::TruncatedStream(what)),
    }
  }
}

/// A little-endian writer of the model container.
pub struct HalaBinaryWriter<W: Write> {
  writer: W,
}

/// The implementation of the binary writer.
impl<W: Write> HalaBinaryWriter<W> {
  pub fn new(writer: W) -> Self {
    Self { writer }
  }

  pub fn write_file_id(&mut self, id: &[u8; 4]) -> Result<(), HalaModelError> {
    self.write_bytes(id)
  }

  pub fn write_u8(&mut self, value: u8) -> Result<(), HalaModelError> {
    self.write_bytes(&[value])
  }

  pub fn write_u32(&mut self, value: u32) -> Result<(), HalaModelError> {
    self.write_bytes(&value.to_le_bytes())
  }

  pub fn write_f32(&mut self, value: f32) -> Result<(), HalaModelError> {
    self.write_bytes(&value.to_le_bytes())
  }

  pub fn write_vec3(&mut self, value: Vec3) -> Result<(), HalaModelError> {
    for component in value.to_array() {
      self.write_f32(component)?;
    }
    Ok(())
  }

  /// Write a rotation as w, x, y, z.
  pub fn write_quat(&mut self, value: Quat) -> Result<(), HalaModelError> {
    self.write_f32(value.w)?;
    self.write_f32(value.x)?;
    self.write_f32(value.y)?;
    self.write_f32(value.z)
  }

  pub fn write_bounding_box(&mut self, value: &HalaBoundingBox) -> Result<(), HalaModelError> {
    self.write_vec3(value.min)?;
    self.write_vec3(value.max)
  }

  pub fn write_string(&mut self, value: &str) -> Result<(), HalaModelError> {
    self.write_u32(value.len() as u32)?;
    self.write_bytes(value.as_bytes())
  }

  pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), HalaModelError> {
    self.writer.write_all(bytes)?;
    Ok(())
  }

  pub fn flush(&mut self) -> Result<(), HalaModelError> {
    self.writer.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn values_are_little_endian() {
    let mut data = Vec::new();
    let mut writer = HalaBinaryWriter::new(&mut data);
    writer.write_u32(0x0403_0201).unwrap();
    writer.write_string("bone").unwrap();
    writer.write_quat(Quat::from_xyzw(0.0, 0.0, 0.0, 1.0)).unwrap();
    assert_eq!(&data[..4], &[1, 2, 3, 4]);
    assert_eq!(&data[4..8], &[4, 0, 0, 0]);
    assert_eq!(&data[8..12], b"bone");
    assert_eq!(&data[12..16], &1.0f32.to_le_bytes());

    let mut reader = HalaBinaryReader::new(data.as_slice(), 1024);
    assert_eq!(reader.read_u32("value").unwrap(), 0x0403_0201);
    assert_eq!(reader.read_string("name").unwrap(), "bone");
    assert_eq!(reader.read_quat("rotation").unwrap(), Quat::IDENTITY);
  }

  #[test]
  fn short_reads_are_truncation() {
    let mut reader = HalaBinaryReader::new(&[1u8, 2][..], 1024);
    assert!(matches!(reader.read_u32("count"), Err(HalaModelError::TruncatedStream("count"))));

    let mut reader = HalaBinaryReader::new(&[0u8; 8][..], 1024);
    assert!(matches!(reader.read_bytes(9, "payload"), Err(HalaModelError::TruncatedStream("payload"))));
  }

  #[test]
  fn oversized_payload_fails_before_reading() {
    let mut reader = HalaBinaryReader::new(&[0u8; 8][..], 4);
    assert!(matches!(
      reader.read_bytes(8, "payload"),
      Err(HalaModelError::PayloadTooLarge { what: "payload", size: 8, limit: 4 })));
  }

  #[test]
  fn optional_vector_distinguishes_end_from_truncation() {
    let mut reader = HalaBinaryReader::new(&[][..], 1024);
    assert_eq!(reader.read_file_id().ok(), None);
    assert_eq!(reader.try_read_vec3("center").unwrap(), None);

    let mut reader = HalaBinaryReader::new(&[0u8; 5][..], 1024);
    assert!(matches!(reader.try_read_vec3("center"), Err(HalaModelError::TruncatedStream("center"))));
  }
}
