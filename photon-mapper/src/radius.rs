use crate::gpu::PhotonKind;

/// Statistically progressive shrinking of a gather radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusEstimator {
    /// Fraction of photons kept between iterations; lower values shrink the
    /// radius faster (less bias, more noise).
    pub alpha: f32,

    /// Radius below which photons stop contributing visibly.
    pub floor: f32,
}

impl RadiusEstimator {
    /// Returns the radius to use after iteration `iteration` (counted from
    /// one) has been accumulated.
    pub fn update(&self, radius: f32, iteration: u32) -> f32 {
        let n = iteration as f32;

        (radius * ((n + self.alpha) / (n + 1.0)).sqrt()).max(self.floor)
    }
}

/// Current gather radii of both populations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Radii {
    pub caustic: f32,
    pub global: f32,
}

impl Radii {
    pub fn get(&self, kind: PhotonKind) -> f32 {
        match kind {
            PhotonKind::Caustic => self.caustic,
            PhotonKind::Global => self.global,
        }
    }

    /// Shrinks both radii after iteration `iteration` has been accumulated.
    pub fn shrink(
        &mut self,
        iteration: u32,
        caustic: RadiusEstimator,
        global: RadiusEstimator,
    ) {
        self.caustic = caustic.update(self.caustic, iteration);
        self.global = global.update(self.global, iteration);
    }
}
