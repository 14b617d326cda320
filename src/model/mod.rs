pub mod loader;
pub mod vertex;
pub mod bounds;
pub mod buffer;
pub mod geometry;
pub mod morph;
pub mod skeleton;
pub mod primitive;
pub mod model;
pub mod clone;

pub use vertex::{
  HalaVertexElementType,
  HalaVertexElementSemantic,
  HalaVertexElement,
  HalaVertexLayout,
};
pub use bounds::HalaBoundingBox;
pub use buffer::{
  HalaBufferState,
  HalaVertexBuffer,
  HalaIndexBuffer,
  HalaVertexBufferHandle,
  HalaIndexBufferHandle,
};
pub use geometry::{
  HalaPrimitiveTopology,
  HalaLodLevel,
  HalaGeometry,
};
pub use morph::{
  HalaMorphDelta,
  HalaVertexBufferMorph,
  HalaModelMorph,
};
pub use skeleton::{
  HalaBone,
  HalaSkeleton,
};
pub use primitive::{
  HalaVertex,
  HalaPrimitive,
};
pub use model::{
  HalaModel,
  HalaModelState,
};
pub use clone::{
  HalaModelClone,
  HalaCloneSlotFailure,
};
