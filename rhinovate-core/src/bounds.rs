//! Axis-aligned bounding boxes

use crate::point::*;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Point3f,
    pub max: Point3f,
}

impl Aabb {
    /// Smallest box containing every point, `None` when the iterator is empty
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3f>,
    {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut min = first;
        let mut max = first;
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }
        Some(Self { min, max })
    }

    pub fn center(&self) -> Point3f {
        Point3f::from((self.min.coords + self.max.coords) * 0.5)
    }

    /// Size along each axis
    pub fn extents(&self) -> Vector3f {
        self.max - self.min
    }

    /// Box grown by `margin` on every side
    pub fn padded(&self, margin: f32) -> Self {
        let m = Vector3f::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    pub fn contains(&self, p: &Point3f) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_points() {
        let pts = [
            Point3f::new(-1.0, 0.0, 2.0),
            Point3f::new(3.0, -4.0, 0.5),
            Point3f::new(0.0, 1.0, 1.0),
        ];
        let bb = Aabb::from_points(&pts).unwrap();
        assert_eq!(bb.min, Point3f::new(-1.0, -4.0, 0.5));
        assert_eq!(bb.max, Point3f::new(3.0, 1.0, 2.0));
        assert_relative_eq!(bb.center(), Point3f::new(1.0, -1.5, 1.25));
        assert_relative_eq!(bb.extents(), Vector3f::new(4.0, 5.0, 1.5));
    }

    #[test]
    fn test_empty_and_padding() {
        let empty: [Point3f; 0] = [];
        assert!(Aabb::from_points(&empty).is_none());

        let bb = Aabb::from_points(&[Point3f::origin()]).unwrap().padded(0.5);
        assert!(bb.contains(&Point3f::new(0.5, -0.5, 0.25)));
        assert!(!bb.contains(&Point3f::new(0.6, 0.0, 0.0)));
    }
}
