use std::ops::{Deref, DerefMut};
use std::{any, mem};

use crate::{
    BindingResource, BoundResource, BufferDesc, BufferId, RenderDevice,
    StorageBufferable,
};

/// Storage buffer that exists both on the host machine and the GPU.
///
/// It's allocated both in RAM and VRAM, and uses [`DerefMut`] to track
/// whether it's been modified since the last [`Self::flush()`].
#[derive(Debug)]
pub struct MappedStorageBuffer<T> {
    id: BufferId,
    data: T,
    dirty: bool,
}

impl<T> MappedStorageBuffer<T>
where
    T: StorageBufferable,
{
    pub fn new(
        device: &mut dyn RenderDevice,
        label: impl AsRef<str>,
        size: usize,
        data: T,
    ) -> Self {
        let label = label.as_ref();

        log::info!(
            "Allocating storage buffer `{label}`; ty={}, size={size}",
            any::type_name::<T>(),
        );

        let id = device.create_buffer(
            &BufferDesc {
                label: label.into(),
                size: size as _,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST,
            },
            None,
        );

        Self {
            id,
            data,
            dirty: true,
        }
    }

    /// Uploads the data if it changed since the previous flush; returns
    /// whether anything got written.
    pub fn flush(&mut self, device: &mut dyn RenderDevice) -> bool {
        if !mem::take(&mut self.dirty) {
            return false;
        }

        device.write_buffer(self.id, 0, self.data.data());

        true
    }
}

impl<T> MappedStorageBuffer<T> {
    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn bind_readable(&self) -> BoundResource {
        BoundResource::readable(BindingResource::Buffer(self.id))
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        device.destroy_buffer(self.id);
    }
}

impl<T> Deref for MappedStorageBuffer<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for MappedStorageBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.dirty = true;

        &mut self.data
    }
}
