use std::ops::{BitOr, BitOrAssign};

use derivative::Derivative;
use glam::UVec2;

use crate::{Scene, TextureId};

/// G-buffer channels consumed by the collect pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GBuffer {
    pub pos_w: TextureId,
    pub normal_w: TextureId,
    pub view_w: TextureId,
    pub thp_mat_id: TextureId,
    pub emissive: TextureId,
}

/// Flags a render pass raises to tell the rest of the render graph what it
/// has invalidated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshFlags(u32);

impl RefreshFlags {
    pub const NONE: Self = Self(0);

    /// Render options changed; accumulating passes should restart.
    pub const RENDER_OPTIONS_CHANGED: Self = Self(1 << 0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RefreshFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RefreshFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Everything the host hands to the photon mapper for a single frame.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FrameContext<'a> {
    #[derivative(Debug = "ignore")]
    pub scene: Option<&'a dyn Scene>,

    /// Size of the G-buffer and of the output image.
    pub size: UVec2,

    pub gbuffer: GBuffer,
    pub output: TextureId,
    pub refresh_flags: RefreshFlags,
}
