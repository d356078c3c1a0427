//! Per-vertex normal and tangent generation from positions, indices, and UVs.
//!
//! Face normals and UV-Jacobian tangents are accumulated onto each
//! triangle's vertices, then normalized and Gram-Schmidt orthogonalized per
//! vertex. Degenerate input never yields NaN: zero-area UV triangles add no
//! tangent, and vectors that end up zero fall back to a valid basis.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
use strata_math::{cross3, cross4};
use strata_terrain::ExecutionPath;
use tracing::trace;

/// Shading basis for every vertex of a mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TangentFrame {
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec3>,
}

/// Computes [`TangentFrame`]s with the selected implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct TangentSpaceBuilder {
    execution: ExecutionPath,
}

impl TangentSpaceBuilder {
    pub fn new(execution: ExecutionPath) -> Self {
        Self { execution }
    }

    pub fn compute(&self, positions: &[Vec3], indices: &[u32], uvs: &[Vec2]) -> TangentFrame {
        let frame = match self.execution {
            ExecutionPath::Scalar => compute_scalar(positions, indices, uvs),
            ExecutionPath::Vectorized => compute_batched(positions, indices, uvs),
        };
        trace!(
            vertices = positions.len(),
            triangles = indices.len() / 3,
            "tangent frame computed"
        );
        frame
    }
}

/// Reference implementation, one vector operation at a time.
pub fn compute_scalar(positions: &[Vec3], indices: &[u32], uvs: &[Vec2]) -> TangentFrame {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    let mut tangents = vec![Vec3::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];

        let edge1 = positions[i1] - positions[i0];
        let edge2 = positions[i2] - positions[i0];
        let du1 = uvs[i1].x - uvs[i0].x;
        let dv1 = uvs[i1].y - uvs[i0].y;
        let du2 = uvs[i2].x - uvs[i0].x;
        let dv2 = uvs[i2].y - uvs[i0].y;

        let face_normal = cross3(edge2, edge1);
        let r = 1.0 / (du1 * dv2 - du2 * dv1);
        let tangent = if r.is_finite() {
            (edge1 * dv2 - edge2 * dv1) * r
        } else {
            Vec3::ZERO
        };

        for i in [i0, i1, i2] {
            normals[i] += face_normal;
            tangents[i] += tangent;
        }
    }

    finalize(normals, tangents)
}

/// One triangle per call in packed 4-lane form. The `w` lane is unused.
#[inline]
fn triangle_basis_batched(p: [Vec4; 3], uv: Vec4, uv0: Vec4) -> (Vec4, Vec4) {
    let edge1 = p[1] - p[0];
    let edge2 = p[2] - p[0];

    // (du1, dv1, du2, dv2)
    let d = uv - uv0;
    // (du1 * dv2, dv1 * du2, du2 * dv1, dv2 * du1)
    let cross_terms = d * d.wzyx();
    let r = 1.0 / (cross_terms.x - cross_terms.z);

    let face_normal = cross4(edge2, edge1);
    let tangent = if r.is_finite() {
        (edge1 * Vec4::splat(d.w) - edge2 * Vec4::splat(d.y)) * Vec4::splat(r)
    } else {
        Vec4::ZERO
    };
    (face_normal, tangent)
}

/// Lane-batched implementation. Matches [`compute_scalar`] within float rounding.
pub fn compute_batched(positions: &[Vec3], indices: &[u32], uvs: &[Vec2]) -> TangentFrame {
    let mut normals = vec![Vec4::ZERO; positions.len()];
    let mut tangents = vec![Vec4::ZERO; positions.len()];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p = [
            positions[i0].extend(0.0),
            positions[i1].extend(0.0),
            positions[i2].extend(0.0),
        ];
        let uv = Vec4::new(uvs[i1].x, uvs[i1].y, uvs[i2].x, uvs[i2].y);
        let uv0 = Vec4::new(uvs[i0].x, uvs[i0].y, uvs[i0].x, uvs[i0].y);

        let (face_normal, tangent) = triangle_basis_batched(p, uv, uv0);
        for i in [i0, i1, i2] {
            normals[i] += face_normal;
            tangents[i] += tangent;
        }
    }

    finalize(
        normals.into_iter().map(Vec4::xyz).collect(),
        tangents.into_iter().map(Vec4::xyz).collect(),
    )
}

fn finalize(normals: Vec<Vec3>, tangents: Vec<Vec3>) -> TangentFrame {
    let mut out = TangentFrame {
        normals: Vec::with_capacity(normals.len()),
        tangents: Vec::with_capacity(tangents.len()),
    };
    for (n, t) in normals.into_iter().zip(tangents) {
        let normal = n.try_normalize().unwrap_or(Vec3::Z);
        let tangent = (t - normal * normal.dot(t))
            .try_normalize()
            .unwrap_or_else(|| normal.any_orthonormal_vector());
        out.normals.push(normal);
        out.tangents.push(tangent);
    }
    out
}
