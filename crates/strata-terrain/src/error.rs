//! Terrain configuration error types.

/// Errors raised while validating grid geometry or generation options.
///
/// These are only produced up front, before any height data is allocated.
/// Out-of-bounds sampling and degenerate geometry are handled by clamping and
/// never surface as errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    /// One of the section counts is zero.
    #[error("section count must be positive, got {x_sections}x{y_sections}")]
    InvalidSectionCount { x_sections: u32, y_sections: u32 },

    /// A section needs at least two vertices along each axis.
    #[error("sections need at least 2 vertices per axis, got {x_size}x{y_size}")]
    InvalidVertexCount { x_size: u32, y_size: u32 },

    /// Vertex spacing must be a positive, finite number.
    #[error("edge size must be positive and finite, got {0}")]
    InvalidEdgeSize(f32),

    /// An erosion or filter constant is outside its usable range.
    #[error("invalid constant `{name}`: {reason}")]
    InvalidConstant {
        name: &'static str,
        reason: &'static str,
    },
}
