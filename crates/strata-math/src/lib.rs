//! Small numeric kernels shared by the erosion and tangent-space code.
//!
//! The lane types wrap `glam`'s SIMD-backed vectors so the batched code paths
//! stay portable: on targets without SIMD support `glam` falls back to scalar
//! storage and the results are unchanged.

mod lanes;

pub use lanes::{F32x8, cross3, cross4, horizontal_sum4, is_negative4, lerp4, sqrt4};
