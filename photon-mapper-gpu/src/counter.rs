use bytemuck::{Pod, Zeroable};

use crate::PhotonKind;

/// Contents of the photon counter buffer: one ticket counter per population.
///
/// Kernels bump the counter for every photon they attempt to store, so after
/// a generate pass it holds the population's *demand*, which may exceed its
/// capacity; only the first `capacity` tickets own a slot.
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct PhotonCounts {
    pub caustic: u32,
    pub global: u32,
}

impl PhotonCounts {
    pub const SIZE: usize = 8;

    pub fn new(caustic: u32, global: u32) -> Self {
        Self { caustic, global }
    }

    pub fn get(&self, kind: PhotonKind) -> u32 {
        match kind {
            PhotonKind::Caustic => self.caustic,
            PhotonKind::Global => self.global,
        }
    }

    pub fn set(&mut self, kind: PhotonKind, value: u32) {
        match kind {
            PhotonKind::Caustic => self.caustic = value,
            PhotonKind::Global => self.global = value,
        }
    }

    /// Number of photons actually stored, given the capacities the kernel ran
    /// with.
    pub fn stored(&self, capacities: PhotonCounts) -> Self {
        Self {
            caustic: self.caustic.min(capacities.caustic),
            global: self.global.min(capacities.global),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.caustic == 0 && self.global == 0
    }
}

/// Converts a ticket obtained through an atomic increment of the population's
/// counter into a slot index, or `None` when the population is already full
/// (in which case the photon is dropped).
pub fn claim_slot(ticket: u32, capacity: u32) -> Option<u32> {
    if ticket < capacity {
        Some(ticket)
    } else {
        None
    }
}

/// Host-side rendition of the kernel's slot claiming, operating on a real
/// atomic; used by CPU emulation of the generate pass.
#[cfg(not(target_arch = "spirv"))]
pub fn claim_slot_atomic(
    counter: &core::sync::atomic::AtomicU32,
    capacity: u32,
) -> Option<u32> {
    let ticket = counter.fetch_add(1, core::sync::atomic::Ordering::Relaxed);

    claim_slot(ticket, capacity)
}
