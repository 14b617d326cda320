use crate::error::HalaModelError;

/// The value type of a vertex element.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HalaVertexElementType {
  Int = 0,
  Float1 = 1,
  Float2 = 2,
  Float3 = 3,
  Float4 = 4,
  UByte4 = 5,
  UByte4Norm = 6,
}

/// The implementation of the vertex element type.
impl HalaVertexElementType {
  /// Get the size in bytes of a value of this type.
  /// return: The size in bytes.
  pub const fn size(&self) -> usize {
    match self {
      HalaVertexElementType::Int => 4,
      HalaVertexElementType::Float1 => 4,
      HalaVertexElementType::Float2 => 8,
      HalaVertexElementType::Float3 => 12,
      HalaVertexElementType::Float4 => 16,
      HalaVertexElementType::UByte4 => 4,
      HalaVertexElementType::UByte4Norm => 4,
    }
  }

  /// Get the number of f32 components, zero for non-float types.
  /// return: The component count.
  pub const fn float_components(&self) -> usize {
    match self {
      HalaVertexElementType::Float1 => 1,
      HalaVertexElementType::Float2 => 2,
      HalaVertexElementType::Float3 => 3,
      HalaVertexElementType::Float4 => 4,
      _ => 0,
    }
  }

  fn from_u8(value: u8) -> Option<Self> {
    match value {
      0 => Some(HalaVertexElementType::Int),
      1 => Some(HalaVertexElementType::Float1),
      2 => Some(HalaVertexElementType::Float2),
      3 => Some(HalaVertexElementType::Float3),
      4 => Some(HalaVertexElementType::Float4),
      5 => Some(HalaVertexElementType::UByte4),
      6 => Some(HalaVertexElementType::UByte4Norm),
      _ => None,
    }
  }
}

/// The semantic of a vertex element.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HalaVertexElementSemantic {
  Position = 0,
  Normal = 1,
  Binormal = 2,
  Tangent = 3,
  TexCoord = 4,
  Color = 5,
  BlendWeights = 6,
  BlendIndices = 7,
  ObjectIndex = 8,
}

/// The implementation of the vertex element semantic.
impl HalaVertexElementSemantic {
  fn from_u8(value: u8) -> Option<Self> {
    match value {
      0 => Some(HalaVertexElementSemantic::Position),
      1 => Some(HalaVertexElementSemantic::Normal),
      2 => Some(HalaVertexElementSemantic::Binormal),
      3 => Some(HalaVertexElementSemantic::Tangent),
      4 => Some(HalaVertexElementSemantic::TexCoord),
      5 => Some(HalaVertexElementSemantic::Color),
      6 => Some(HalaVertexElementSemantic::BlendWeights),
      7 => Some(HalaVertexElementSemantic::BlendIndices),
      8 => Some(HalaVertexElementSemantic::ObjectIndex),
      _ => None,
    }
  }
}

/// A typed, semantic-tagged element of a vertex.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HalaVertexElement {
  pub element_type: HalaVertexElementType,
  pub semantic: HalaVertexElementSemantic,
  pub index: u8,
}

/// The implementation of the vertex element.
impl HalaVertexElement {
  /// Create a new vertex element.
  /// param element_type: The value type.
  /// param semantic: The semantic.
  /// param index: The semantic index.
  /// return: The vertex element.
  pub const fn new(element_type: HalaVertexElementType, semantic: HalaVertexElementSemantic, index: u8) -> Self {
    Self {
      element_type,
      semantic,
      index,
    }
  }

  /// Pack the element as type | semantic << 8 | index << 16.
  /// return: The packed description.
  pub fn to_packed(&self) -> u32 {
    (self.element_type as u32) | ((self.semantic as u32) << 8) | ((self.index as u32) << 16)
  }

  /// Unpack an element description written by to_packed.
  /// param packed: The packed description.
  /// return: The vertex element.
  pub fn from_packed(packed: u32) -> Result<Self, HalaModelError> {
    let element_type = HalaVertexElementType::from_u8((packed & 0xff) as u8)
      .ok_or(HalaModelError::InvalidVertexElement(packed))?;
    let semantic = HalaVertexElementSemantic::from_u8(((packed >> 8) & 0xff) as u8)
      .ok_or(HalaModelError::InvalidVertexElement(packed))?;
    let index = ((packed >> 16) & 0xff) as u8;
    Ok(Self::new(element_type, semantic, index))
  }
}

/// The canonical elements of the legacy element mask, bit i selects entry i.
pub const LEGACY_VERTEX_ELEMENTS: [HalaVertexElement; 14] = [
  HalaVertexElement::new(HalaVertexElementType::Float3, HalaVertexElementSemantic::Position, 0),
  HalaVertexElement::new(HalaVertexElementType::Float3, HalaVertexElementSemantic::Normal, 0),
  HalaVertexElement::new(HalaVertexElementType::UByte4Norm, HalaVertexElementSemantic::Color, 0),
  HalaVertexElement::new(HalaVertexElementType::Float2, HalaVertexElementSemantic::TexCoord, 0),
  HalaVertexElement::new(HalaVertexElementType::Float2, HalaVertexElementSemantic::TexCoord, 1),
  HalaVertexElement::new(HalaVertexElementType::Float3, HalaVertexElementSemantic::TexCoord, 0),
  HalaVertexElement::new(HalaVertexElementType::Float3, HalaVertexElementSemantic::TexCoord, 1),
  HalaVertexElement::new(HalaVertexElementType::Float4, HalaVertexElementSemantic::Tangent, 0),
  HalaVertexElement::new(HalaVertexElementType::Float4, HalaVertexElementSemantic::BlendWeights, 0),
  HalaVertexElement::new(HalaVertexElementType::UByte4, HalaVertexElementSemantic::BlendIndices, 0),
  HalaVertexElement::new(HalaVertexElementType::Float4, HalaVertexElementSemantic::TexCoord, 4),
  HalaVertexElement::new(HalaVertexElementType::Float4, HalaVertexElementSemantic::TexCoord, 5),
  HalaVertexElement::new(HalaVertexElementType::Float4, HalaVertexElementSemantic::TexCoord, 6),
  HalaVertexElement::new(HalaVertexElementType::Int, HalaVertexElementSemantic::ObjectIndex, 0),
];

/// An ordered list of vertex elements. The order defines the byte layout of a vertex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HalaVertexLayout {
  elements: Vec<HalaVertexElement>,
}

/// The implementation of the vertex layout.
impl HalaVertexLayout {
  /// Create a new vertex layout.
  /// param elements: The elements in memory order.
  /// return: The vertex layout.
  pub fn new(elements: Vec<HalaVertexElement>) -> Self {
    Self { elements }
  }

  /// Build the layout selected by a legacy element mask.
  /// param mask: The element mask.
  /// return: The vertex layout.
  pub fn from_legacy_mask(mask: u32) -> Self {
    let unknown_bits = mask >> LEGACY_VERTEX_ELEMENTS.len();
    if unknown_bits != 0 {
      log::warn!("Ignoring unknown legacy vertex element bits 0x{:x}.", unknown_bits << LEGACY_VERTEX_ELEMENTS.len());
    }
    let elements = LEGACY_VERTEX_ELEMENTS.iter()
      .enumerate()
      .filter(|(bit, _)| mask & (1 << bit) != 0)
      .map(|(_, element)| *element)
      .collect();
    Self { elements }
  }

  /// The standard layout of an imported vertex: position, normal, tangent and tex coord.
  /// return: The vertex layout.
  pub fn standard() -> Self {
    Self::new(vec![
      HalaVertexElement::new(HalaVertexElementType::Float3, HalaVertexElementSemantic::Position, 0),
      HalaVertexElement::new(HalaVertexElementType::Float3, HalaVertexElementSemantic::Normal, 0),
      HalaVertexElement::new(HalaVertexElementType::Float4, HalaVertexElementSemantic::Tangent, 0),
      HalaVertexElement::new(HalaVertexElementType::Float2, HalaVertexElementSemantic::TexCoord, 0),
    ])
  }

  pub fn elements(&self) -> &[HalaVertexElement] {
    &self.elements
  }

  pub fn len(&self) -> usize {
    self.elements.len()
  }

  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  /// Get the size of one vertex in bytes.
  /// return: The stride.
  pub fn stride(&self) -> usize {
    self.elements.iter().map(|element| element.element_type.size()).sum()
  }

  /// Check if the layout has an element with the semantic and semantic index.
  /// param semantic: The semantic.
  /// param index: The semantic index.
  /// return: True if the element exists.
  pub fn has_element(&self, semantic: HalaVertexElementSemantic, index: u8) -> bool {
    self.find(semantic, index).is_some()
  }

  /// Get the element with the semantic and semantic index.
  /// param semantic: The semantic.
  /// param index: The semantic index.
  /// return: The element.
  pub fn element(&self, semantic: HalaVertexElementSemantic, index: u8) -> Option<&HalaVertexElement> {
    self.find(semantic, index).map(|(_, element)| element)
  }

  /// Get the byte offset of the element with the semantic and semantic index.
  /// param semantic: The semantic.
  /// param index: The semantic index.
  /// return: The offset from the start of a vertex.
  pub fn element_offset(&self, semantic: HalaVertexElementSemantic, index: u8) -> Option<usize> {
    self.find(semantic, index).map(|(offset, _)| offset)
  }

  fn find(&self, semantic: HalaVertexElementSemantic, index: u8) -> Option<(usize, &HalaVertexElement)> {
    let mut offset = 0;
    for element in self.elements.iter() {
      if element.semantic == semantic && element.index == index {
        return Some((offset, element));
      }
      offset += element.element_type.size();
    }
    None
  }
}
