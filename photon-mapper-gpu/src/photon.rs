use bytemuck::{Pod, Zeroable};
use glam::{uvec2, vec3, UVec2, Vec3};

use crate::INFO_TEXTURE_HEIGHT;

/// Population a photon gets deposited into.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug, Hash))]
pub enum PhotonKind {
    /// Photon that reached a diffuse receiver through at least one specular
    /// bounce.
    Caustic = 0,

    /// Any other photon stored on a diffuse surface.
    Global = 1,
}

impl PhotonKind {
    pub const ALL: [Self; 2] = [Self::Caustic, Self::Global];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Mask of the top-level instance holding this population; collect rays
    /// select populations by masking with these bits.
    pub fn instance_mask(self) -> u32 {
        1 << (self as u32)
    }

    #[cfg(not(target_arch = "spirv"))]
    pub fn name(self) -> &'static str {
        match self {
            PhotonKind::Caustic => "caustic",
            PhotonKind::Global => "global",
        }
    }
}

/// Axis-aligned box around a deposited photon; layout matches the procedural
/// AABB geometry consumed by bottom-level acceleration structure builds.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct PhotonAabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl PhotonAabb {
    /// Size of a single AABB in bytes, also used as the geometry stride.
    pub const STRIDE: u32 = 24;

    /// Returns a box tightly bounding the sphere of given radius.
    pub fn around(center: Vec3, radius: f32) -> Self {
        let min = center - Vec3::splat(radius);
        let max = center + Vec3::splat(radius);

        Self {
            min: min.to_array(),
            max: max.to_array(),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    pub fn radius(&self) -> f32 {
        (self.max[0] - self.min[0]) * 0.5
    }

    pub fn min(&self) -> Vec3 {
        vec3(self.min[0], self.min[1], self.min[2])
    }

    pub fn max(&self) -> Vec3 {
        vec3(self.max[0], self.max[1], self.max[2])
    }

    /// Intersection test used by the collect pass: a point query hits the
    /// photon when the point lies inside the photon's sphere (the box itself
    /// is only a conservative bound).
    pub fn hit_by(&self, point: Vec3) -> bool {
        let radius = self.radius();

        point.distance_squared(self.center()) <= radius * radius
    }
}

/// Returns the info-texture texel that stores data of the photon with given
/// slot index.
pub fn info_texel(index: u32) -> UVec2 {
    uvec2(index / INFO_TEXTURE_HEIGHT, index % INFO_TEXTURE_HEIGHT)
}

/// Returns the info-texture size needed for given capacity; `capacity` must
/// be a multiple of [`INFO_TEXTURE_HEIGHT`].
pub fn info_texture_size(capacity: u32) -> UVec2 {
    uvec2(capacity / INFO_TEXTURE_HEIGHT, INFO_TEXTURE_HEIGHT)
}
