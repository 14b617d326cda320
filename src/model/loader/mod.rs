pub mod stream;
pub mod device_uploader;
pub mod model_loader;
pub mod model_saver;

pub use device_uploader::{
  HalaBufferDevice,
  HalaDeviceBufferId,
  HalaHostDevice,
};
pub use model_loader::{
  HalaLoadMode,
  HalaLoadHandle,
  MODEL_FILE_ID,
  MODEL_FILE_ID_LEGACY,
};
