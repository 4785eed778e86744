//! Common structs and per-thread algorithms used both by the photon mapper's
//! kernels and by its host-side orchestration.

#![cfg_attr(target_arch = "spirv", no_std)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::manual_range_contains)]

mod collect;
mod counter;
mod culling;
mod instance;
mod light_sample;
mod noise;
mod passes;
mod photon;
mod utils;

pub use self::collect::*;
pub use self::counter::*;
pub use self::culling::*;
pub use self::instance::*;
pub use self::light_sample::*;
pub use self::noise::*;
pub use self::passes::*;
pub use self::photon::*;
pub use self::utils::*;

/// Height of every photon info texture and of the light-sample table.
///
/// Photons are addressed as a 2D grid of this height, because their count
/// easily exceeds the maximum width of a 1D texture.
pub const INFO_TEXTURE_HEIGHT: u32 = 512;

/// Smallest gather radius at which photons still contribute visibly.
pub const MIN_PHOTON_RADIUS: f32 = 0.0001;

/// Near bound of collect rays; together with [`COLLECT_T_MAX`] it collapses
/// the ray into a point query.
pub const COLLECT_T_MIN: f32 = 0.000001;

/// Far bound of collect rays.
pub const COLLECT_T_MAX: f32 = 0.000002;
