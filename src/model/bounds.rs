use glam::Vec3;

/// Axis-aligned bounding box stored as min and max corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalaBoundingBox {
  pub min: Vec3,
  pub max: Vec3,
}

impl Default for HalaBoundingBox {
  fn default() -> Self {
    Self {
      min: Vec3::ZERO,
      max: Vec3::ZERO,
    }
  }
}

/// Implementation of HalaBoundingBox.
impl HalaBoundingBox {

  /// Create a new HalaBoundingBox instance.
  /// param min: The minimum corner.
  /// param max: The maximum corner.
  /// return: The new HalaBoundingBox instance.
  pub fn new(min: Vec3, max: Vec3) -> Self {
    Self { min, max }
  }

  /// Create a box that contains all the points.
  /// param points: The points.
  /// return: The box, or the default box if there are no points.
  pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
    let mut iter = points.into_iter();
    match iter.next() {
      Some(first) => {
        let mut bounds = Self::new(first, first);
        for point in iter {
          bounds.encapsulate_point(point);
        }
        bounds
      },
      None => Self::default(),
    }
  }

  /// Get the center of the box.
  /// return: The center.
  pub fn get_center(&self) -> Vec3 {
    (self.min + self.max) * 0.5
  }

  /// Get the half size of the box.
  /// return: The extents.
  pub fn get_extents(&self) -> Vec3 {
    (self.max - self.min) * 0.5
  }

  /// Get the size of the box.
  /// return: The size.
  pub fn get_size(&self) -> Vec3 {
    self.max - self.min
  }

  /// Grows the box to include the given point.
  /// param point: The point to include.
  pub fn encapsulate_point(&mut self, point: Vec3) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }

  /// Grows the box to include the given box.
  /// param bounds: The box to include.
  pub fn encapsulate_bounds(&mut self, bounds: &HalaBoundingBox) {
    self.encapsulate_point(bounds.min);
    self.encapsulate_point(bounds.max);
  }

  /// Does another box intersect with this box?
  /// param other: The other box to check.
  /// return: True if the boxes intersect, false otherwise.
  pub fn intersects(&self, other: &HalaBoundingBox) -> bool {
    self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
  }

  /// Does the box contain the point?
  /// param point: The point to check.
  /// return: True if the point is inside or on the surface.
  pub fn contains_point(&self, point: Vec3) -> bool {
    self.min.cmple(point).all() && self.max.cmpge(point).all()
  }

}
