use glam::{
  Affine3A,
  Mat4,
  Quat,
  Vec3,
};

use crate::error::HalaModelError;
use super::bounds::HalaBoundingBox;

/// Bone collision mask bits.
pub const BONE_COLLISION_SPHERE: u8 = 0x1;
pub const BONE_COLLISION_BOX: u8 = 0x2;

/// A bone of a skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct HalaBone {
  pub name: String,
  pub parent: Option<u32>,
  pub initial_position: Vec3,
  pub initial_rotation: Quat,
  pub initial_scale: Vec3,
  /// Transforms from model space to bone space in the bind pose.
  pub offset_matrix: Affine3A,
  pub collision_mask: u8,
  pub radius: f32,
  pub bounding_box: HalaBoundingBox,
}

/// The default implementation of the bone.
impl Default for HalaBone {
  fn default() -> Self {
    Self {
      name: String::new(),
      parent: None,
      initial_position: Vec3::ZERO,
      initial_rotation: Quat::IDENTITY,
      initial_scale: Vec3::ONE,
      offset_matrix: Affine3A::IDENTITY,
      collision_mask: 0,
      radius: 0.0,
      bounding_box: HalaBoundingBox::default(),
    }
  }
}

/// The implementation of the bone.
impl HalaBone {
  /// Get the bind pose transform relative to the parent.
  /// return: The local transform.
  pub fn local_transform(&self) -> Mat4 {
    Mat4::from_scale_rotation_translation(self.initial_scale, self.initial_rotation, self.initial_position)
  }
}

/// A skeleton is a forest of bones linked by parent indices.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HalaSkeleton {
  bones: Vec<HalaBone>,
  root_bone_index: Option<u32>,
}

/// The implementation of the skeleton.
impl HalaSkeleton {
  /// Create a skeleton from bones.
  /// param bones: The bones.
  /// return: The skeleton.
  pub fn new(bones: Vec<HalaBone>) -> Result<Self, HalaModelError> {
    let count = bones.len() as u32;
    for (index, bone) in bones.iter().enumerate() {
      if let Some(parent) = bone.parent {
        if parent == index as u32 {
          return Err(HalaModelError::SelfParentedBone { bone: parent });
        }
        if parent >= count {
          return Err(HalaModelError::BoneIndexOutOfRange { index: parent, count });
        }
      }
    }
    let root_bone_index = bones.iter().position(|bone| bone.parent.is_none()).map(|index| index as u32);
    Ok(Self {
      bones,
      root_bone_index,
    })
  }

  pub fn bones(&self) -> &[HalaBone] {
    &self.bones
  }

  pub fn num_bones(&self) -> u32 {
    self.bones.len() as u32
  }

  pub fn root_bone_index(&self) -> Option<u32> {
    self.root_bone_index
  }

  pub fn root_bone(&self) -> Option<&HalaBone> {
    self.root_bone_index.and_then(|index| self.bones.get(index as usize))
  }

  pub fn bone(&self, index: u32) -> Option<&HalaBone> {
    self.bones.get(index as usize)
  }

  /// Find a bone by name.
  /// param name: The bone name.
  /// return: The bone index.
  pub fn bone_index(&self, name: &str) -> Option<u32> {
    self.bones.iter().position(|bone| bone.name == name).map(|index| index as u32)
  }

  /// Get the child indices of every bone.
  /// return: The children per bone.
  pub fn children(&self) -> Vec<Vec<u32>> {
    let mut children = vec![vec![]; self.bones.len()];
    for (index, bone) in self.bones.iter().enumerate() {
      if let Some(parent) = bone.parent {
        children[parent as usize].push(index as u32);
      }
    }
    children
  }

  /// Compute the model space bind pose transform of every bone.
  /// Bones may appear before their parents.
  /// return: The world transforms.
  pub fn bind_pose_transforms(&self) -> Vec<Mat4> {
    let mut world_transforms: Vec<Option<Mat4>> = vec![None; self.bones.len()];
    for start in 0..self.bones.len() {
      // Walk up to the first resolved ancestor, then resolve back down.
      let mut chain = vec![];
      let mut current = Some(start);
      while let Some(index) = current {
        if world_transforms[index].is_some() || chain.len() > self.bones.len() {
          break;
        }
        chain.push(index);
        current = self.bones[index].parent.map(|parent| parent as usize);
      }
      for &index in chain.iter().rev() {
        let local = self.bones[index].local_transform();
        let parent_world = self.bones[index].parent
          .and_then(|parent| world_transforms[parent as usize]);
        world_transforms[index] = Some(match parent_world {
          Some(parent_world) => parent_world * local,
          None => local,
        });
      }
    }
    world_transforms.into_iter().map(|transform| transform.unwrap_or(Mat4::IDENTITY)).collect()
  }

  /// Check that every bone mapping entry references an existing bone.
  /// param mapping: The skin slot to bone index mapping.
  /// return: The result.
  pub fn validate_bone_mapping(&self, mapping: &[u32]) -> Result<(), HalaModelError> {
    let count = self.num_bones();
    match mapping.iter().find(|&&index| index >= count) {
      Some(&index) => Err(HalaModelError::BoneIndexOutOfRange { index, count }),
      None => Ok(()),
    }
  }
}
