use std::mem;

use log::{debug, error, info};

use crate::gpu::{self, PhotonAabb, PhotonCounts, PhotonInstance, PhotonKind};
use crate::{
    AccelBuild, AccelBuildMode, AccelId, AccelInputs, Barrier, Error,
    MappedStorageBuffer, PhotonBuffers, PrebuildInfo, RenderDevice, Resource,
    ResourceState, Result, StorageBuffer,
};

const ALIGNMENT: u64 = 256;

/// Acceleration structure together with the buffer backing it.
#[derive(Debug)]
struct AccelStorage {
    accel: AccelId,
    storage: StorageBuffer<Vec<u8>>,
}

impl AccelStorage {
    fn new(
        device: &mut dyn RenderDevice,
        label: &str,
        prebuild: PrebuildInfo,
    ) -> Self {
        let size = gpu::align_to(prebuild.result_size, ALIGNMENT);
        let storage = StorageBuffer::new(device, label, size as usize);
        let accel = device.create_accel(label, storage.id(), size);

        Self { accel, storage }
    }

    fn destroy(self, device: &mut dyn RenderDevice) {
        device.destroy_accel(self.accel);
        self.storage.destroy(device);
    }
}

#[derive(Debug)]
struct AccelResources {
    blas: [AccelStorage; 2],
    tlas: AccelStorage,
    instances: MappedStorageBuffer<Vec<PhotonInstance>>,

    /// Shared by all three builds, which are issued one after another.
    scratch: StorageBuffer<Vec<u8>>,
}

impl AccelResources {
    fn new(
        device: &mut dyn RenderDevice,
        populations: &[PhotonBuffers; 2],
        mode: AccelBuildMode,
    ) -> Self {
        let mut scratch_size = 0;

        let blas = populations.each_ref().map(|buffers| {
            let inputs = bottom_level_inputs(buffers, buffers.capacity());
            let prebuild = device.accel_prebuild_info(&inputs, mode);

            scratch_size = scratch_size.max(scratch_size_of(prebuild));

            AccelStorage::new(
                &mut *device,
                &format!("photon_{}_blas", buffers.kind().name()),
                prebuild,
            )
        });

        let instances: Vec<_> = PhotonKind::ALL
            .into_iter()
            .map(|kind| {
                PhotonInstance::new(
                    kind,
                    device.accel_address(blas[kind.index()].accel),
                )
            })
            .collect();

        let instances = MappedStorageBuffer::new(
            device,
            "photon_tlas_instances",
            instances.len() * PhotonInstance::SIZE,
            instances,
        );

        let prebuild = device
            .accel_prebuild_info(&top_level_inputs(&instances), mode);

        scratch_size = scratch_size.max(scratch_size_of(prebuild));

        let tlas = AccelStorage::new(device, "photon_tlas", prebuild);

        let scratch = StorageBuffer::new(
            device,
            "photon_accel_scratch",
            scratch_size as usize,
        );

        Self {
            blas,
            tlas,
            instances,
            scratch,
        }
    }

    fn destroy(self, device: &mut dyn RenderDevice) {
        for blas in self.blas {
            blas.destroy(device);
        }

        self.tlas.destroy(device);
        self.instances.destroy(device);
        self.scratch.destroy(device);
    }
}

/// Acceleration structure over both photon populations: one bottom-level
/// structure per population, instanced twice by a single top-level one.
///
/// Structures are allocated against the populations' capacities and then
/// only re-built (with the current photon counts) every iteration; they get
/// reallocated when the photon buffers are resized or the build mode
/// changes.
#[derive(Debug, Default)]
pub struct PhotonAccel {
    mode: AccelBuildMode,
    resources: Option<AccelResources>,
    builds: u32,
    full_builds: u32,
    last_build_full: bool,
    unsupported_reported: bool,
}

impl PhotonAccel {
    pub fn new(mode: AccelBuildMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Number of AABBs each bottom-level structure should be built over.
    ///
    /// The current iteration's count is known only after its generate pass
    /// has finished, so the previous iteration's count (plus some headroom)
    /// is used instead; with no previous count at hand, whole capacities are.
    pub fn build_counts(
        last_demand: Option<PhotonCounts>,
        capacities: PhotonCounts,
        overestimate_factor: f32,
    ) -> PhotonCounts {
        let Some(demand) = last_demand else {
            return capacities;
        };

        let mut counts = PhotonCounts::default();

        for kind in PhotonKind::ALL {
            let count = demand.get(kind) as f32 * overestimate_factor;

            counts.set(kind, (count.ceil() as u32).min(capacities.get(kind)));
        }

        counts
    }

    pub fn mode(&self) -> AccelBuildMode {
        self.mode
    }

    pub fn set_mode(&mut self, device: &mut dyn RenderDevice, mode: AccelBuildMode) {
        if self.mode != mode {
            info!("Changing acceleration structure build mode to {mode:?}");

            self.mode = mode;
            self.invalidate(device);
        }
    }

    /// Releases all structures; the next build reallocates them from
    /// scratch.
    pub fn invalidate(&mut self, device: &mut dyn RenderDevice) {
        if let Some(resources) = self.resources.take() {
            resources.destroy(device);
        }
    }

    /// Fails (and logs, once) when the device can't build acceleration
    /// structures.
    pub fn check_support(&mut self, device: &dyn RenderDevice) -> Result<()> {
        if device.caps().raytracing {
            return Ok(());
        }

        if !mem::replace(&mut self.unsupported_reported, true) {
            error!(
                "Raytracing is not supported by the current device; photon \
                 mapping is disabled"
            );
        }

        Err(Error::RaytracingUnsupported)
    }

    /// Records builds of both bottom-level structures and of the top-level
    /// one; returns the top-level structure collect rays are traced against.
    pub fn build(
        &mut self,
        device: &mut dyn RenderDevice,
        populations: &[PhotonBuffers; 2],
        counts: PhotonCounts,
    ) -> Result<AccelId> {
        self.check_support(device)?;

        let (mut resources, full) = match self.resources.take() {
            Some(resources) => (resources, false),

            None => {
                info!(
                    "Allocating photon acceleration structures; mode={:?}, \
                     capacities={:?}",
                    self.mode,
                    populations.each_ref().map(|buffers| buffers.capacity()),
                );

                (AccelResources::new(device, populations, self.mode), true)
            }
        };

        debug!("Building photon acceleration structures; counts={counts:?}");

        // AABBs written by the generate pass must land before the builds read
        // them
        for buffers in populations {
            device.barrier(Barrier::Uav(Resource::Buffer(buffers.aabbs.id())));
        }

        for (blas, buffers) in resources.blas.iter().zip(populations) {
            let count = counts.get(buffers.kind()).min(buffers.capacity());

            device.build_accel(&AccelBuild {
                inputs: bottom_level_inputs(buffers, count),
                mode: self.mode,
                dst: blas.accel,
                scratch: resources.scratch.id(),
            });

            device.barrier(Barrier::AccelBuild(blas.accel));
        }

        if resources.instances.flush(device) {
            device.barrier(Barrier::Transition {
                resource: Resource::Buffer(resources.instances.id()),
                state: ResourceState::ShaderResource,
            });
        }

        device.build_accel(&AccelBuild {
            inputs: top_level_inputs(&resources.instances),
            mode: self.mode,
            dst: resources.tlas.accel,
            scratch: resources.scratch.id(),
        });

        device.barrier(Barrier::AccelBuild(resources.tlas.accel));

        self.builds += 1;
        self.last_build_full = full;

        if full {
            self.full_builds += 1;
        }

        let tlas = resources.tlas.accel;

        self.resources = Some(resources);

        Ok(tlas)
    }

    pub fn tlas(&self) -> Option<AccelId> {
        self.resources.as_ref().map(|resources| resources.tlas.accel)
    }

    pub fn builds(&self) -> u32 {
        self.builds
    }

    /// Number of builds that had to allocate the structures first.
    pub fn full_builds(&self) -> u32 {
        self.full_builds
    }

    pub fn last_build_full(&self) -> bool {
        self.last_build_full
    }

    pub fn release(&mut self, device: &mut dyn RenderDevice) {
        self.invalidate(device);
    }
}

fn bottom_level_inputs(buffers: &PhotonBuffers, count: u32) -> AccelInputs {
    AccelInputs::BottomLevel {
        aabbs: buffers.aabbs.id(),
        count,
        stride: PhotonAabb::STRIDE,
    }
}

fn top_level_inputs(
    instances: &MappedStorageBuffer<Vec<PhotonInstance>>,
) -> AccelInputs {
    AccelInputs::TopLevel {
        instances: instances.id(),
        count: instances.len() as u32,
    }
}

fn scratch_size_of(prebuild: PrebuildInfo) -> u64 {
    gpu::align_to(
        prebuild.scratch_size.max(prebuild.update_scratch_size),
        ALIGNMENT,
    )
}
