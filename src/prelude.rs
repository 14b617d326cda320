pub use crate::error::{
  HalaModelError,
  HalaBufferKind,
};
pub use crate::config::HalaModelConfig;
pub use crate::model::{
  HalaVertexElementType,
  HalaVertexElementSemantic,
  HalaVertexElement,
  HalaVertexLayout,
  HalaBoundingBox,
  HalaBufferState,
  HalaVertexBuffer,
  HalaIndexBuffer,
  HalaVertexBufferHandle,
  HalaIndexBufferHandle,
  HalaPrimitiveTopology,
  HalaLodLevel,
  HalaGeometry,
  HalaMorphDelta,
  HalaVertexBufferMorph,
  HalaModelMorph,
  HalaBone,
  HalaSkeleton,
  HalaVertex,
  HalaPrimitive,
  HalaModel,
  HalaModelState,
  HalaModelClone,
  HalaCloneSlotFailure,
};
pub use crate::model::loader::{
  HalaBufferDevice,
  HalaDeviceBufferId,
  HalaHostDevice,
  HalaLoadMode,
  HalaLoadHandle,
};
