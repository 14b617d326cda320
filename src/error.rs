use thiserror::Error;

/// The buffer kind referenced by an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalaBufferKind {
  Vertex,
  Index,
}

/// The implementation Display trait for the buffer kind.
impl std::fmt::Display for HalaBufferKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      HalaBufferKind::Vertex => write!(f, "vertex"),
      HalaBufferKind::Index => write!(f, "index"),
    }
  }
}

/// The error type of the hala-model crate.
#[derive(Error, Debug)]
pub enum HalaModelError {
  #[error("Unrecognized model file id {0:?}.")]
  UnrecognizedFormat([u8; 4]),

  #[error("Unexpected end of stream while reading {0}.")]
  TruncatedStream(&'static str),

  #[error("LOD level {lod} of geometry {geometry} references {kind} buffer {index}, but only {count} exist.")]
  DanglingBufferReference {
    geometry: u32,
    lod: u32,
    kind: HalaBufferKind,
    index: u32,
    count: u32,
  },

  #[error("Morph \"{morph}\" references vertex {vertex} of vertex buffer {buffer}, which has only {count} vertices.")]
  MorphIndexOutOfRange {
    morph: String,
    buffer: u32,
    vertex: u32,
    count: u32,
  },

  #[error("Morph \"{morph}\" targets vertex buffer {buffer}, but only {count} exist.")]
  MorphBufferOutOfRange {
    morph: String,
    buffer: u32,
    count: u32,
  },

  #[error("Bone {bone} is its own parent.")]
  SelfParentedBone {
    bone: u32,
  },

  #[error("Bone index {index} is out of range, the skeleton has {count} bones.")]
  BoneIndexOutOfRange {
    index: u32,
    count: u32,
  },

  #[error("The {kind} buffer {index} is not shadowed.")]
  UnshadowedBuffer {
    kind: HalaBufferKind,
    index: u32,
  },

  #[error("Geometry {0} has zero LOD levels.")]
  ZeroLodLevels(u32),

  #[error("The model has already been finalized.")]
  AlreadyFinalized,

  #[error("Cloning the {kind} buffer {index} failed, affected (geometry, lod) slots: {slots:?}.")]
  CloneSlotFailed {
    kind: HalaBufferKind,
    index: u32,
    slots: Vec<(u32, u32)>,
  },

  #[error("Invalid packed vertex element description 0x{0:08x}.")]
  InvalidVertexElement(u32),

  #[error("Invalid index size {0}, expected 2 or 4.")]
  InvalidIndexSize(u32),

  #[error("Invalid primitive topology {0}.")]
  InvalidPrimitiveTopology(u32),

  #[error("LOD level {lod} of geometry {geometry} draws indices {start}..{end}, but the index buffer holds {count}.")]
  InvalidDrawRange {
    geometry: u32,
    lod: u32,
    start: u64,
    end: u64,
    count: u32,
  },

  #[error("LOD level {lod} of geometry {geometry} has the non-finite distance {distance}.")]
  InvalidLodDistance {
    geometry: u32,
    lod: u32,
    distance: f32,
  },

  #[error("LOD distances of geometry {geometry} decrease at level {lod}.")]
  NonMonotonicLodDistances {
    geometry: u32,
    lod: u32,
  },

  #[error("The {what} payload of {size} bytes exceeds the limit of {limit} bytes.")]
  PayloadTooLarge {
    what: &'static str,
    size: u64,
    limit: u64,
  },

  #[error("The {kind} buffer payload is {actual} bytes, expected {expected}.")]
  InvalidBufferSize {
    kind: HalaBufferKind,
    expected: usize,
    actual: usize,
  },

  #[error("Geometry index {index} is out of bounds, the model has {count} geometries.")]
  GeometryOutOfRange {
    index: u32,
    count: u32,
  },

  #[error("LOD level {lod} of geometry {geometry} is out of bounds, the geometry has {count} levels.")]
  LodLevelOutOfRange {
    geometry: u32,
    lod: u32,
    count: u32,
  },

  #[error("LOD level {lod} of geometry {geometry} is not set.")]
  IncompleteGeometry {
    geometry: u32,
    lod: u32,
  },

  #[error("The model still has buffers pending upload.")]
  NotFinalized,

  #[error("The load handle belongs to a superseded load.")]
  StaleLoadHandle,

  #[error("Device error: {0}")]
  Device(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error("Invalid model config.")]
  Config(#[from] serde_json::Error),
}

/// The implementation of the error type of the hala-model crate.
impl HalaModelError {
  /// Whether the error aborts a whole load.
  /// Structural and format errors do, per-resource clone failures do not.
  /// return: True if the error is fatal for a load.
  pub fn is_fatal(&self) -> bool {
    !matches!(self, HalaModelError::CloneSlotFailed { .. })
  }
}
