use glam::UVec2;
use serde::{Deserialize, Serialize};

use crate::gpu::{self, CullingHash};
use crate::{
    AccelBuildMode, CollectStrategy, Error, InfoPrecision, LightSamplingMode,
    RadiusEstimator, Result,
};

/// Size of the photon image relative to the rest of the render graph.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum OutputSize {
    /// Same as the host's default render target.
    #[default]
    Default,

    /// [`PhotonMapperConfig::fixed_output_size`].
    Fixed,
}

/// Camera jitter pattern the host should apply while this pass is active.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum SamplePattern {
    #[default]
    Center,
    Dx11,
    Halton,
    Stratified,
}

impl SamplePattern {
    pub const ALL: [Self; 4] =
        [Self::Center, Self::Dx11, Self::Halton, Self::Stratified];

    pub fn name(self) -> &'static str {
        match self {
            SamplePattern::Center => "Center",
            SamplePattern::Dx11 => "DirectX",
            SamplePattern::Halton => "Halton",
            SamplePattern::Stratified => "Stratified",
        }
    }
}

/// Every tunable parameter of the photon mapper.
///
/// Serialized with camelCase keys; that's the layout of the scripting
/// dictionary, too.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhotonMapperConfig {
    /// Number of photons requested per iteration; the realized number can be
    /// slightly larger, see [`crate::LightTable`].
    pub photons: u32,

    pub caustic_buffer_size: u32,
    pub global_buffer_size: u32,

    /// Headroom applied whenever buffers are sized from observed photon
    /// counts.
    pub overestimate_factor: f32,

    pub use_sppm: bool,
    pub caustic_alpha: f32,
    pub global_alpha: f32,
    pub max_bounces: u32,
    pub caustic_radius_start: f32,
    pub global_radius_start: f32,
    pub radius_floor: f32,

    /// Probability of a photon being terminated at each bounce after the
    /// first one.
    pub rejection_probability: f32,

    pub emissive_scale: f32,
    pub spec_rough_cutoff: f32,
    pub emissive_cutoff: f32,

    #[serde(rename = "useAlphaTest")]
    pub alpha_test: bool,

    pub adjust_shading_normals: bool,

    pub culling: bool,
    pub culling_hash_bits: u32,

    pub accel_build_mode: AccelBuildMode,
    pub light_sampling_mode: LightSamplingMode,

    pub collect_caustic: bool,
    pub collect_global: bool,
    pub stochastic_collect: bool,
    pub stochastic_max_photons: u32,

    pub info_precision: InfoPrecision,

    pub always_reset: bool,
    pub use_timer: bool,
    pub timer_seconds: f32,
    pub use_max_iterations: bool,
    pub max_iterations: u32,

    pub output_size: OutputSize,
    pub fixed_output_size: UVec2,
    pub sample_pattern: SamplePattern,
    pub sample_count: u32,
}

impl Default for PhotonMapperConfig {
    fn default() -> Self {
        Self {
            photons: 2_000_000,
            caustic_buffer_size: 500_000,
            global_buffer_size: 1_000_000,
            overestimate_factor: 1.1,
            use_sppm: true,
            caustic_alpha: 0.7,
            global_alpha: 0.7,
            max_bounces: 10,
            caustic_radius_start: 0.01,
            global_radius_start: 0.05,
            radius_floor: gpu::MIN_PHOTON_RADIUS,
            rejection_probability: 0.3,
            emissive_scale: 1.0,
            spec_rough_cutoff: 0.5,
            emissive_cutoff: 0.0,
            alpha_test: true,
            adjust_shading_normals: true,
            culling: true,
            culling_hash_bits: 18,
            accel_build_mode: AccelBuildMode::FastBuild,
            light_sampling_mode: LightSamplingMode::Power,
            collect_caustic: true,
            collect_global: true,
            stochastic_collect: true,
            stochastic_max_photons: 3,
            info_precision: InfoPrecision::Half,
            always_reset: false,
            use_timer: false,
            timer_seconds: 60.0,
            use_max_iterations: false,
            max_iterations: 1000,
            output_size: OutputSize::Default,
            fixed_output_size: UVec2::new(512, 512),
            sample_pattern: SamplePattern::Center,
            sample_count: 16,
        }
    }
}

impl PhotonMapperConfig {
    pub const MAX_BOUNCES: u32 = 32;
    pub const MAX_STOCHASTIC_PHOTONS: u32 = 16;

    pub fn from_dictionary(dict: serde_json::Value) -> Result<Self> {
        let this: Self = serde_json::from_value(dict)?;

        this.validate()?;

        Ok(this)
    }

    pub fn to_dictionary(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, msg: impl FnOnce() -> String) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(Error::InvalidConfig(msg()))
            }
        }

        check(self.overestimate_factor >= 1.0, || {
            format!(
                "overestimateFactor must be at least 1.0, got {}",
                self.overestimate_factor
            )
        })?;

        for (name, alpha) in [
            ("causticAlpha", self.caustic_alpha),
            ("globalAlpha", self.global_alpha),
        ] {
            check(alpha > 0.0 && alpha <= 1.0, || {
                format!("{name} must be within (0, 1], got {alpha}")
            })?;
        }

        check(
            (1..=Self::MAX_BOUNCES).contains(&self.max_bounces),
            || {
                format!(
                    "maxBounces must be within 1..={}, got {}",
                    Self::MAX_BOUNCES,
                    self.max_bounces
                )
            },
        )?;

        check(self.radius_floor > 0.0, || {
            format!("radiusFloor must be positive, got {}", self.radius_floor)
        })?;

        for (name, radius) in [
            ("causticRadiusStart", self.caustic_radius_start),
            ("globalRadiusStart", self.global_radius_start),
        ] {
            check(radius >= self.radius_floor, || {
                format!(
                    "{name} must not be smaller than radiusFloor ({}), got \
                     {radius}",
                    self.radius_floor
                )
            })?;
        }

        check(
            self.rejection_probability >= 0.0
                && self.rejection_probability < 1.0,
            || {
                format!(
                    "rejectionProbability must be within [0, 1), got {}",
                    self.rejection_probability
                )
            },
        )?;

        check(self.emissive_scale >= 0.0, || {
            format!(
                "emissiveScale must not be negative, got {}",
                self.emissive_scale
            )
        })?;

        check(
            (CullingHash::MIN_BITS..=CullingHash::MAX_BITS)
                .contains(&self.culling_hash_bits),
            || {
                format!(
                    "cullingHashBits must be within {}..={}, got {}",
                    CullingHash::MIN_BITS,
                    CullingHash::MAX_BITS,
                    self.culling_hash_bits
                )
            },
        )?;

        check(
            (1..=Self::MAX_STOCHASTIC_PHOTONS)
                .contains(&self.stochastic_max_photons),
            || {
                format!(
                    "stochasticMaxPhotons must be within 1..={}, got {}",
                    Self::MAX_STOCHASTIC_PHOTONS,
                    self.stochastic_max_photons
                )
            },
        )?;

        check(self.timer_seconds > 0.0, || {
            format!(
                "timerSeconds must be positive, got {}",
                self.timer_seconds
            )
        })?;

        check(self.sample_count > 0, || "sampleCount must be positive".into())?;

        check(
            self.output_size != OutputSize::Fixed
                || (self.fixed_output_size.x > 0
                    && self.fixed_output_size.y > 0),
            || {
                format!(
                    "fixedOutputSize must be non-empty, got {}",
                    self.fixed_output_size
                )
            },
        )?;

        Ok(())
    }

    pub fn caustic_estimator(&self) -> RadiusEstimator {
        RadiusEstimator {
            alpha: self.caustic_alpha,
            floor: self.radius_floor,
        }
    }

    pub fn global_estimator(&self) -> RadiusEstimator {
        RadiusEstimator {
            alpha: self.global_alpha,
            floor: self.radius_floor,
        }
    }

    pub fn collect_strategy(&self) -> CollectStrategy {
        CollectStrategy {
            stochastic: self.stochastic_collect,
            max_photons: self.stochastic_max_photons,
        }
    }

    /// Compares this (pending) configuration against the one currently
    /// applied.
    pub fn changes_since(&self, applied: &Self) -> ConfigChanges {
        ConfigChanges {
            light_table: self.photons != applied.photons
                || self.light_sampling_mode != applied.light_sampling_mode,
            buffers: self.caustic_buffer_size != applied.caustic_buffer_size
                || self.global_buffer_size != applied.global_buffer_size,
            accel: self.accel_build_mode != applied.accel_build_mode,
            collect_program: self.collect_strategy()
                != applied.collect_strategy(),
            precision: self.info_precision != applied.info_precision,
            culling: self.culling != applied.culling
                || self.culling_hash_bits != applied.culling_hash_bits,
            any: self != applied,
        }
    }
}

/// Subsystems that have to be rebuilt after a configuration change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigChanges {
    pub light_table: bool,
    pub buffers: bool,
    pub accel: bool,
    pub collect_program: bool,
    pub precision: bool,
    pub culling: bool,

    /// Whether anything changed at all; every change restarts the
    /// accumulation.
    pub any: bool,
}
