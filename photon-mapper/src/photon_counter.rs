use std::slice;

use crate::gpu::PhotonCounts;
use crate::{
    Barrier, BoundResource, ReadbackBuffer, RenderDevice, Resource,
    ResourceState, StorageBuffer, StorageBufferable,
};

/// Per-population atomic counters bumped by the generate pass.
///
/// The counters are reset through a copy from a zero-filled buffer and, after
/// generation, copied into a staging buffer that's read back at the start of
/// the next frame; the photon mapper never waits for the current frame's
/// counts.
#[derive(Debug)]
pub struct PhotonCounter {
    counter: StorageBuffer<PhotonCounts>,
    reset: StorageBuffer<PhotonCounts>,
    staging: ReadbackBuffer<PhotonCounts>,
}

impl PhotonCounter {
    pub fn new(device: &mut dyn RenderDevice) -> Self {
        Self {
            counter: StorageBuffer::new_with_contents(
                device,
                "photon_counter",
                &PhotonCounts::default(),
            ),
            reset: StorageBuffer::new_with_contents(
                device,
                "photon_counter_reset",
                &PhotonCounts::default(),
            ),
            staging: ReadbackBuffer::new(
                device,
                "photon_counter_staging",
                PhotonCounts::default(),
            ),
        }
    }

    pub fn reset(&self, device: &mut dyn RenderDevice) {
        device.copy_buffer(
            self.reset.id(),
            0,
            self.counter.id(),
            0,
            PhotonCounts::SIZE as _,
        );

        device.barrier(Barrier::Transition {
            resource: Resource::Buffer(self.counter.id()),
            state: ResourceState::UnorderedAccess,
        });
    }

    /// Records a copy of the counters into the staging buffer; must be
    /// called after the generate pass has been dispatched.
    pub fn schedule_readback(&self, device: &mut dyn RenderDevice) {
        device.barrier(Barrier::Uav(Resource::Buffer(self.counter.id())));
        device.barrier(Barrier::Transition {
            resource: Resource::Buffer(self.counter.id()),
            state: ResourceState::CopySource,
        });

        self.staging.copy_from(device, self.counter.id());
    }

    /// Returns the demand observed by the most recent generate pass whose
    /// readback has been scheduled.
    pub fn read(&self, device: &mut dyn RenderDevice) -> PhotonCounts {
        self.staging.read(device)
    }

    pub fn bind_writable(&self) -> BoundResource {
        self.counter.bind_writable()
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        self.counter.destroy(device);
        self.reset.destroy(device);
        self.staging.destroy(device);
    }
}

impl StorageBufferable for PhotonCounts {
    fn data(&self) -> &[u8] {
        bytemuck::cast_slice(slice::from_ref(self))
    }
}
