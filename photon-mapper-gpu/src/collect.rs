use core::f32::consts::PI;

use glam::Vec3;

use crate::{F32Ext, WhiteNoise};

/// Disk kernel used for density estimation: every photon within `radius`
/// contributes its flux spread over the disk's area.
pub fn disk_kernel(distance_sq: f32, radius: f32) -> f32 {
    let radius_sq = radius.sqr();

    if radius_sq <= 0.0 || distance_sq > radius_sq {
        0.0
    } else {
        1.0 / (PI * radius_sq)
    }
}

/// Contribution of a single photon to a surface point, before the surface's
/// BSDF is applied.
pub fn photon_contribution(
    point: Vec3,
    photon_pos: Vec3,
    photon_flux: Vec3,
    radius: f32,
) -> Vec3 {
    photon_flux * disk_kernel(point.distance_squared(photon_pos), radius)
}

/// Bounded list of photons collected along a single point query.
///
/// Stochastic collection keeps at most `N` of the intersected photons,
/// selected uniformly through reservoir sampling; the remaining photons are
/// accounted for by [`Self::weight()`], keeping the estimate unbiased while
/// the payload stays fixed-size.
#[derive(Clone, Copy)]
pub struct CollectReservoir<const N: usize> {
    photons: [u32; N],
    len: u32,
    seen: u32,
}

impl<const N: usize> CollectReservoir<N> {
    pub fn new() -> Self {
        Self {
            photons: [0; N],
            len: 0,
            seen: 0,
        }
    }

    /// Registers an intersected photon; returns whether it got stored.
    pub fn push(&mut self, wnoise: &mut WhiteNoise, photon: u32) -> bool {
        self.seen += 1;

        if (self.len as usize) < N {
            self.photons[self.len as usize] = photon;
            self.len += 1;

            return true;
        }

        let slot = wnoise.sample_int() % self.seen;

        if (slot as usize) < N {
            self.photons[slot as usize] = photon;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn seen(&self) -> u32 {
        self.seen
    }

    pub fn get(&self, idx: u32) -> u32 {
        self.photons[idx as usize]
    }

    /// Number of intersected photons each stored photon stands for.
    pub fn weight(&self) -> f32 {
        if self.len == 0 {
            0.0
        } else {
            (self.seen as f32) / (self.len as f32)
        }
    }
}

impl<const N: usize> Default for CollectReservoir<N> {
    fn default() -> Self {
        Self::new()
    }
}
