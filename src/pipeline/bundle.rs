//! GeometryBundle: ownership container for a pipeline run's outputs.
//!
//! A run produces one primary mesh plus whatever non-mesh side products
//! modifiers emitted. The primary mesh is held as a
//! [`MeshHandle`](crate::mesh::MeshHandle) so an untouched input can be
//! aliased instead of copied.

use crate::mesh::MeshHandle;

/// Non-mesh geometry a modifier may emit alongside its mesh output.
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryComponent {
    PointCloud {
        positions: Vec<[f32; 3]>,
    },
    Curves {
        positions: Vec<[f32; 3]>,
        /// First-point offset per curve, like face offsets.
        offsets: Vec<u32>,
    },
}

impl GeometryComponent {
    /// Point count of this component.
    pub fn points_num(&self) -> usize {
        match self {
            GeometryComponent::PointCloud { positions } => positions.len(),
            GeometryComponent::Curves { positions, .. } => positions.len(),
        }
    }
}

/// The evaluated geometry of one pipeline run.
#[derive(Debug)]
pub struct GeometryBundle {
    /// Primary mesh; owned when any modifier produced one, shared when the
    /// pristine input could be aliased.
    pub mesh: MeshHandle,
    /// Side outputs, in emission order.
    pub extra: Vec<GeometryComponent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use std::sync::Arc;

    #[test]
    fn component_point_counts() {
        let pc = GeometryComponent::PointCloud {
            positions: vec![[0.0; 3]; 5],
        };
        assert_eq!(pc.points_num(), 5);
        let cu = GeometryComponent::Curves {
            positions: vec![[0.0; 3]; 4],
            offsets: vec![0, 2],
        };
        assert_eq!(cu.points_num(), 4);
    }

    #[test]
    fn bundle_can_alias_input() {
        let input = Arc::new(Mesh::with_counts(0, 0, 0, 0));
        let b = GeometryBundle {
            mesh: MeshHandle::shared(input.clone()),
            extra: Vec::new(),
        };
        assert!(b.mesh.is_shared());
        assert_eq!(b.mesh.data_id(), input.data_id());
    }
}
