//! Shared fixtures: a small mesh and a few concrete modifiers.

// not every test binary uses every helper
#![allow(dead_code)]

use mesh_modstack::attr::{AttrData, AttrDomain, AttrKind, AttrLayer, AttrMask};
use mesh_modstack::mesh::Mesh;
use mesh_modstack::modifier::{
    ModeMask, Modifier, ModifierCaps, ModifierContext, ModifierOutput,
};
use mesh_modstack::origindex::ORIGINDEX_NONE;
use mesh_modstack::pipeline::GeometryComponent;
use std::sync::Arc;

/// A unit quad in the XY plane.
pub fn quad() -> Mesh {
    Mesh::from_arrays(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![[0, 1], [1, 2], [2, 3], [3, 0]],
        vec![0, 1, 2, 3],
        vec![0],
    )
    .unwrap()
}

/// Deform-only translation.
pub struct Translate {
    pub delta: [f32; 3],
    pub mode: ModeMask,
}

impl Translate {
    pub fn by(delta: [f32; 3]) -> Translate {
        Translate {
            delta,
            mode: ModeMask::DEFAULT,
        }
    }

    pub fn render_only(delta: [f32; 3]) -> Translate {
        Translate {
            delta,
            mode: ModeMask::RENDER,
        }
    }
}

impl Modifier for Translate {
    fn name(&self) -> &str {
        "translate"
    }
    fn caps(&self) -> ModifierCaps {
        ModifierCaps::OnlyDeform
    }
    fn required_mode(&self) -> ModeMask {
        self.mode
    }
    fn deform(&self, _ctx: &ModifierContext, _mesh: &Mesh, positions: &mut [[f32; 3]]) {
        for p in positions {
            for axis in 0..3 {
                p[axis] += self.delta[axis];
            }
        }
    }
}

/// Constructive modifier: appends a translated copy of the whole mesh.
/// Copied elements are stamped as having no original.
pub struct Duplicate;

impl Modifier for Duplicate {
    fn name(&self) -> &str {
        "duplicate"
    }
    fn caps(&self) -> ModifierCaps {
        ModifierCaps::Constructive
    }

    // propagates origin indices, so mapped evaluation may keep it
    fn supports_mapping(&self) -> bool {
        true
    }

    fn modify(&self, _ctx: &ModifierContext, mesh: &mut Mesh) -> ModifierOutput {
        let src_pos = mesh.positions().unwrap();
        let n = src_pos.len() as u32;
        let mut positions = src_pos.to_vec();
        positions.extend(src_pos.iter().map(|p| [p[0] + 2.0, p[1], p[2]]));

        let src_edges = mesh.edge_verts().unwrap();
        let mut edges = src_edges.to_vec();
        edges.extend(src_edges.iter().map(|[a, b]| [a + n, b + n]));

        let nc = mesh.corners_num() as u32;
        let src_corners = mesh.corner_verts().unwrap();
        let mut corners = src_corners.to_vec();
        corners.extend(src_corners.iter().map(|c| c + n));

        let src_offsets = mesh.face_offsets().unwrap();
        let mut offsets = src_offsets.to_vec();
        offsets.extend(src_offsets.iter().map(|o| o + nc));

        let mut out = Mesh::from_arrays(positions, edges, corners, offsets).unwrap();
        for (domain, count) in [
            (AttrDomain::Point, n as usize),
            (AttrDomain::Edge, src_edges.len()),
            (AttrDomain::Face, src_offsets.len()),
        ] {
            if let Ok(src) = mesh.table(domain).ints(AttrKind::OrigIndex) {
                let mut mapped = src.to_vec();
                mapped.extend(std::iter::repeat(ORIGINDEX_NONE).take(count));
                out.table_mut(domain).add_layer(AttrLayer {
                    kind: AttrKind::OrigIndex,
                    name: ".origindex".into(),
                    temporary: false,
                    data: AttrData::Int(mapped),
                });
            }
        }
        ModifierOutput {
            replacement: Some(out),
            extra: Vec::new(),
        }
    }
}

/// Constructive modifier that only emits a point cloud alongside the
/// untouched mesh.
pub struct EmitPoints(pub usize);

impl Modifier for EmitPoints {
    fn name(&self) -> &str {
        "emit-points"
    }
    fn caps(&self) -> ModifierCaps {
        ModifierCaps::Constructive
    }
    fn modify(&self, _ctx: &ModifierContext, _mesh: &mut Mesh) -> ModifierOutput {
        ModifierOutput {
            replacement: None,
            extra: vec![GeometryComponent::PointCloud {
                positions: vec![[0.0; 3]; self.0],
            }],
        }
    }
}

pub fn stack(mods: Vec<Box<dyn Modifier>>) -> Vec<Arc<dyn Modifier>> {
    mods.into_iter().map(Arc::from).collect()
}

/// Convenience: the bare mask widened by one extra kind.
pub fn bare_plus(domain: AttrDomain, kind: AttrKind) -> AttrMask {
    AttrMask::BARE.merged(&AttrMask::with(domain, kind))
}
