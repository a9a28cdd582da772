//! Camera model building blocks.
//!
//! The camera pipeline is
//! `pixel = K ∘ distortion ∘ perspective_divide(R p + t)`
//! where `K` is [`Intrinsics`], the distortion is [`BrownConrady5`] and the
//! rigid transform is [`Extrinsics`].

mod camera;
mod distortion;
mod extrinsics;
mod intrinsics;

pub use camera::*;
pub use distortion::*;
pub use extrinsics::*;
pub use intrinsics::*;

use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
