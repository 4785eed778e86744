use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::gpu::{self, PhotonAabb, PhotonCounts, PhotonKind};
use crate::{
    Barrier, RenderDevice, Resource, ResourceState, StorageBuffer, Texture,
};

/// Precision of the photon info textures (flux and direction).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum InfoPrecision {
    #[default]
    #[serde(rename = "16bit")]
    Half,

    #[serde(rename = "32bit")]
    Full,
}

impl InfoPrecision {
    pub const ALL: [Self; 2] = [Self::Half, Self::Full];

    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            InfoPrecision::Half => wgpu::TextureFormat::Rgba16Float,
            InfoPrecision::Full => wgpu::TextureFormat::Rgba32Float,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            InfoPrecision::Half => "16 bits",
            InfoPrecision::Full => "32 bits",
        }
    }
}

/// Storage of a single photon population.
///
/// Slot `i` of [`Self::aabbs`] pairs with texel [`gpu::info_texel(i)`] of
/// both info textures.
#[derive(Debug)]
pub struct PhotonBuffers {
    kind: PhotonKind,
    capacity: u32,
    pub aabbs: StorageBuffer<Vec<PhotonAabb>>,
    pub flux: Texture,
    pub dir: Texture,
}

impl PhotonBuffers {
    fn new(
        device: &mut dyn RenderDevice,
        kind: PhotonKind,
        capacity: u32,
        precision: InfoPrecision,
    ) -> Self {
        let name = kind.name();

        let aabbs = StorageBuffer::new(
            device,
            format!("photon_{name}_aabbs"),
            (capacity as usize) * (PhotonAabb::STRIDE as usize),
        );

        let flux = Texture::builder(format!("photon_{name}_flux"))
            .with_size(gpu::info_texture_size(capacity))
            .with_format(precision.format())
            .build(device);

        let dir = Texture::builder(format!("photon_{name}_dir"))
            .with_size(gpu::info_texture_size(capacity))
            .with_format(precision.format())
            .build(device);

        Self {
            kind,
            capacity,
            aabbs,
            flux,
            dir,
        }
    }

    pub fn kind(&self) -> PhotonKind {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn clear(&self, device: &mut dyn RenderDevice) {
        self.aabbs.clear(device);
        self.flux.clear(device);
        self.dir.clear(device);
    }

    /// Transitions all of the population's storage into given state.
    pub fn transition(
        &self,
        device: &mut dyn RenderDevice,
        state: ResourceState,
    ) {
        for resource in [
            Resource::Buffer(self.aabbs.id()),
            Resource::Texture(self.flux.id()),
            Resource::Texture(self.dir.id()),
        ] {
            device.barrier(Barrier::Transition { resource, state });
        }
    }

    fn destroy(self, device: &mut dyn RenderDevice) {
        self.aabbs.destroy(device);
        self.flux.destroy(device);
        self.dir.destroy(device);
    }
}

/// Owns storage of both photon populations.
///
/// Both populations are always (re)allocated and released together, so
/// their buffers can never go out of sync.
#[derive(Debug, Default)]
pub struct PhotonBufferManager {
    populations: Option<[PhotonBuffers; 2]>,
    precision: InfoPrecision,
    allocations: u32,
    resized: bool,
}

impl PhotonBufferManager {
    /// Rounds given capacity up to a whole number of info-texture rows (at
    /// least one).
    pub fn round_capacity(size: u32) -> u32 {
        size.div_ceil(gpu::INFO_TEXTURE_HEIGHT).max(1) * gpu::INFO_TEXTURE_HEIGHT
    }

    /// Makes sure both populations are backed by storage of (rounded)
    /// requested size, reallocating them if needed.
    ///
    /// Returns `false` when there's nothing to allocate, i.e. both requested
    /// sizes are zero; the caller should skip the iteration and retry later.
    pub fn ensure_capacity(
        &mut self,
        device: &mut dyn RenderDevice,
        requested: PhotonCounts,
    ) -> bool {
        if requested.is_empty() {
            debug!("Photon buffers not ready: no capacity requested");
            return false;
        }

        let target = PhotonCounts::new(
            Self::round_capacity(requested.caustic),
            Self::round_capacity(requested.global),
        );

        if self.populations.is_some() && self.capacities() == target {
            return true;
        }

        self.release(device);

        info!(
            "Allocating photon buffers; caustic={}, global={}, precision={:?}",
            target.caustic, target.global, self.precision
        );

        let precision = self.precision;

        self.populations = Some(PhotonKind::ALL.map(|kind| {
            PhotonBuffers::new(&mut *device, kind, target.get(kind), precision)
        }));

        self.allocations += 1;
        self.resized = true;

        true
    }

    /// Computes new capacities when last iteration's demand reached the
    /// current capacity of any population; returns `None` if the current
    /// buffers are large enough.
    pub fn maybe_grow(
        &self,
        demand: PhotonCounts,
        overestimate_factor: f32,
    ) -> Option<PhotonCounts> {
        let current = self.populations.as_ref()?;
        let mut grown = self.capacities();

        for buffers in current {
            let kind = buffers.kind();
            let count = demand.get(kind);

            if count == 0 || count < buffers.capacity() {
                continue;
            }

            let candidate = Self::round_capacity(
                ((count as f32) * overestimate_factor).ceil() as u32,
            );

            grown.set(kind, candidate.max(buffers.capacity()));
        }

        if grown == self.capacities() {
            None
        } else {
            debug!(
                "Photon buffers exhausted; demand={:?}, growing to {:?}",
                demand, grown
            );

            Some(grown)
        }
    }

    /// Computes capacities fitting last iteration's demand plus given
    /// overestimation; requires both populations to have had any photons.
    pub fn fit_to(
        demand: PhotonCounts,
        overestimate_factor: f32,
    ) -> Option<PhotonCounts> {
        if demand.caustic == 0 || demand.global == 0 {
            return None;
        }

        let scale = |count: u32| ((count as f32) * overestimate_factor) as u32;

        Some(PhotonCounts::new(scale(demand.caustic), scale(demand.global)))
    }

    /// Changes the info texture precision; storage gets reallocated on the
    /// next [`Self::ensure_capacity()`].
    pub fn set_precision(
        &mut self,
        device: &mut dyn RenderDevice,
        precision: InfoPrecision,
    ) {
        if self.precision != precision {
            self.precision = precision;
            self.release(device);
        }
    }

    pub fn precision(&self) -> InfoPrecision {
        self.precision
    }

    pub fn get(&self, kind: PhotonKind) -> Option<&PhotonBuffers> {
        self.populations
            .as_ref()
            .map(|populations| &populations[kind.index()])
    }

    pub fn populations(&self) -> Option<&[PhotonBuffers; 2]> {
        self.populations.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.populations.is_some()
    }

    /// Capacities of the currently allocated buffers (zero if none).
    pub fn capacities(&self) -> PhotonCounts {
        let mut capacities = PhotonCounts::default();

        for buffers in self.populations.iter().flatten() {
            capacities.set(buffers.kind(), buffers.capacity());
        }

        capacities
    }

    /// Number of times storage has been allocated.
    pub fn allocations(&self) -> u32 {
        self.allocations
    }

    /// Returns whether storage got reallocated since the previous call;
    /// everything built against the old storage must be rebuilt.
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    pub fn clear(&self, device: &mut dyn RenderDevice) {
        for buffers in self.populations.iter().flatten() {
            buffers.clear(device);
        }
    }

    pub fn release(&mut self, device: &mut dyn RenderDevice) {
        if let Some(populations) = self.populations.take() {
            for buffers in populations {
                buffers.destroy(device);
            }
        }
    }
}
