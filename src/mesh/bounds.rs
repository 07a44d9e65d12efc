//! Axis-aligned bounding box, computed lazily per mesh.

/// Min/max corner pair. Degenerate (all-zero) for empty meshes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundBox {
    /// Bounds of a position array. An empty array yields the zero box.
    pub fn from_positions(positions: &[[f32; 3]]) -> BoundBox {
        let Some(first) = positions.first() else {
            return BoundBox {
                min: [0.0; 3],
                max: [0.0; 3],
            };
        };
        let mut min = *first;
        let mut max = *first;
        for p in &positions[1..] {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        BoundBox { min, max }
    }

    /// Box center.
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_zero_box() {
        let b = BoundBox::from_positions(&[]);
        assert_eq!(b.min, [0.0; 3]);
        assert_eq!(b.max, [0.0; 3]);
    }

    #[test]
    fn min_max_and_center() {
        let b = BoundBox::from_positions(&[[1.0, -2.0, 0.0], [-1.0, 4.0, 2.0]]);
        assert_eq!(b.min, [-1.0, -2.0, 0.0]);
        assert_eq!(b.max, [1.0, 4.0, 2.0]);
        assert_eq!(b.center(), [0.0, 1.0, 1.0]);
    }
}
