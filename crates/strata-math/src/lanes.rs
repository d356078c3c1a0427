use std::ops::{Add, Mul, Neg, Sub};

use glam::{Vec3, Vec4, Vec4Swizzles};

// ---------------------------------------------------------------------------
// Scalar kernels
// ---------------------------------------------------------------------------

/// Plain component-wise cross product.
#[inline]
pub fn cross3(a: Vec3, b: Vec3) -> Vec3 {
    Vec3::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    )
}

// ---------------------------------------------------------------------------
// 4-lane kernels
// ---------------------------------------------------------------------------

/// Lane-wise `a * (1 - alpha) + b * alpha`.
///
/// With an `alpha` mask of `0.0`/`1.0` values this is a branchless select.
#[inline]
pub fn lerp4(a: Vec4, b: Vec4, alpha: Vec4) -> Vec4 {
    let one_minus_alpha = Vec4::ONE - alpha;
    a * one_minus_alpha + b * alpha
}

/// Lane-wise sign-bit test: `1.0` where the sign bit is set (including
/// `-0.0`), `0.0` elsewhere.
#[inline]
pub fn is_negative4(x: Vec4) -> Vec4 {
    let mask = x.is_negative_bitmask();
    Vec4::new(
        (mask & 1) as f32,
        ((mask >> 1) & 1) as f32,
        ((mask >> 2) & 1) as f32,
        ((mask >> 3) & 1) as f32,
    )
}

/// Lane-wise correctly rounded square root, identical to `f32::sqrt` per lane.
#[inline]
pub fn sqrt4(v: Vec4) -> Vec4 {
    Vec4::from_array(v.to_array().map(f32::sqrt))
}

/// Sum of all four lanes, accumulated in lane order so the result matches a
/// sequential scalar loop bit for bit.
#[inline]
pub fn horizontal_sum4(v: Vec4) -> f32 {
    v.x + v.y + v.z + v.w
}

/// Cross product of the xyz lanes using the `yzx`/`zxy` shuffle form.
///
/// The `w` lane of the result is always zero.
#[inline]
pub fn cross4(a: Vec4, b: Vec4) -> Vec4 {
    let c = a.yzxw() * b.zxyw();
    let d = a.zxyw() * b.yzxw();
    (c - d) * Vec4::new(1.0, 1.0, 1.0, 0.0)
}

// ---------------------------------------------------------------------------
// 8-lane wrapper
// ---------------------------------------------------------------------------

/// Eight `f32` lanes stored as two SIMD halves.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct F32x8 {
    pub lo: Vec4,
    pub hi: Vec4,
}

impl F32x8 {
    pub fn new(lo: Vec4, hi: Vec4) -> Self {
        Self { lo, hi }
    }

    pub fn splat(v: f32) -> Self {
        Self::new(Vec4::splat(v), Vec4::splat(v))
    }

    pub fn from_array(a: [f32; 8]) -> Self {
        Self::new(
            Vec4::new(a[0], a[1], a[2], a[3]),
            Vec4::new(a[4], a[5], a[6], a[7]),
        )
    }

    pub fn to_array(self) -> [f32; 8] {
        let lo = self.lo.to_array();
        let hi = self.hi.to_array();
        [lo[0], lo[1], lo[2], lo[3], hi[0], hi[1], hi[2], hi[3]]
    }

    /// Lane-wise [`lerp4`]; a `0.0`/`1.0` mask in `alpha` selects per lane.
    pub fn lerp(self, rhs: Self, alpha: Self) -> Self {
        Self::new(lerp4(self.lo, rhs.lo, alpha.lo), lerp4(self.hi, rhs.hi, alpha.hi))
    }

    pub fn is_negative(self) -> Self {
        Self::new(is_negative4(self.lo), is_negative4(self.hi))
    }

    pub fn sqrt(self) -> Self {
        Self::new(sqrt4(self.lo), sqrt4(self.hi))
    }
}

impl Add for F32x8 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.lo + rhs.lo, self.hi + rhs.hi)
    }
}

impl Sub for F32x8 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.lo - rhs.lo, self.hi - rhs.hi)
    }
}

impl Mul for F32x8 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(self.lo * rhs.lo, self.hi * rhs.hi)
    }
}

impl Neg for F32x8 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.lo, -self.hi)
    }
}

impl Mul<f32> for F32x8 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.lo * rhs, self.hi * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_is_negative_reads_sign_bit() {
        let lanes = is_negative4(Vec4::new(-1.0, 0.0, -0.0, 7.0));
        assert_eq!(lanes, Vec4::new(1.0, 0.0, 1.0, 0.0));
    }

    #[test]
    fn test_lerp4_mask_selects_exactly() {
        let a = Vec4::new(1.1, -2.3, 3.5, 1e-7);
        let b = Vec4::new(4.7, 6.0, -1.9, 1e7);
        assert_eq!(lerp4(a, b, Vec4::ZERO), a);
        assert_eq!(lerp4(a, b, Vec4::ONE), b);
        let mixed = lerp4(a, b, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(mixed, Vec4::new(b.x, a.y, a.z, b.w));
    }

    #[test]
    fn test_lerp4_interpolates() {
        let a = Vec4::new(1.0, -2.0, 3.5, 10.0);
        let b = Vec4::new(4.0, 6.0, -1.0, 0.0);
        let t = Vec4::new(0.0, 0.25, 0.5, 1.0);
        let lanes = lerp4(a, b, t).to_array();
        for i in 0..4 {
            let expected = a[i] + (b[i] - a[i]) * t[i];
            assert!(
                (lanes[i] - expected).abs() < EPSILON,
                "lane {i}: {} vs {expected}",
                lanes[i]
            );
        }
    }

    #[test]
    fn test_cross4_matches_cross3() {
        let a = Vec3::new(1.5, -2.0, 0.25);
        let b = Vec3::new(-0.5, 3.0, 4.0);
        let expected = cross3(a, b);
        let lanes = cross4(a.extend(9.0), b.extend(-9.0));
        assert!((lanes.truncate() - expected).length() < EPSILON);
        assert_eq!(lanes.w, 0.0);
        assert!((expected - a.cross(b)).length() < EPSILON);
    }

    #[test]
    fn test_horizontal_sum_is_sequential() {
        assert_eq!(horizontal_sum4(Vec4::new(1.0, 2.0, 3.0, 4.0)), 10.0);
        // Pairwise reduction would give (1e8 + -1e8) + (1 + 1) = 2.
        let v = Vec4::new(1e8, 1.0, -1e8, 1.0);
        let mut sequential = 0.0;
        for lane in v.to_array() {
            sequential += lane;
        }
        assert_eq!(horizontal_sum4(v), sequential);
    }

    #[test]
    fn test_sqrt_matches_scalar_per_lane() {
        let values = [0.0, 1e-20, 2.0, 3.0, 17.5, 1e6, 123.456, 0.3];
        let lanes = F32x8::from_array(values).sqrt().to_array();
        for (lane, v) in lanes.iter().zip(values) {
            assert_eq!(lane.to_bits(), v.sqrt().to_bits());
        }
    }

    #[test]
    fn test_f32x8_lane_ops() {
        let a = F32x8::from_array([1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0]);
        let b = F32x8::splat(2.0);
        assert_eq!(
            (a * b).to_array(),
            [2.0, -2.0, 4.0, -4.0, 6.0, -6.0, 8.0, -8.0]
        );
        assert_eq!((a * 2.0).to_array(), (a * b).to_array());
        assert_eq!(
            a.is_negative().to_array(),
            [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]
        );
        assert_eq!((a - a).to_array(), [0.0; 8]);
        assert_eq!((a + a).to_array()[0], 2.0);
        assert_eq!((-a).to_array()[1], 1.0);
        let picked = a.lerp(-a, a.is_negative());
        assert_eq!(picked.to_array(), [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 4.0, 4.0]);
    }
}
