//! Progressive photon mapping, orchestrated on top of a host render graph.
//!
//! Every frame, [`PhotonMapper`] emits photons from the scene's lights into
//! two populations (caustic and global), builds acceleration structures over
//! them and gathers them around the visible surfaces; between frames the
//! gather radii shrink (SPPM) so that the accumulated estimate converges.

mod accel;
mod buffers;
mod config;
mod device;
mod error;
mod frame;
mod iteration;
mod light_table;
mod pass;
mod passes;
mod photon_counter;
mod photon_mapper;
mod photons;
mod radius;
mod render_pass;
mod scene;
mod seeds;
#[cfg(test)]
mod testing;
mod utils;

pub use photon_mapper_gpu as gpu;

pub use self::accel::*;
pub use self::buffers::*;
pub use self::config::*;
pub use self::device::*;
pub use self::error::*;
pub use self::frame::*;
pub use self::iteration::*;
pub use self::light_table::*;
pub use self::pass::*;
pub use self::passes::*;
pub use self::photon_counter::*;
pub use self::photon_mapper::*;
pub use self::photons::*;
pub use self::radius::*;
pub use self::render_pass::*;
pub use self::scene::*;
pub use self::seeds::*;
