use std::marker::PhantomData;
use std::{any, mem};

use bytemuck::Pod;

use crate::{BufferDesc, BufferId, RenderDevice};

/// CPU-visible staging buffer the GPU copies results into, read back on a
/// later frame.
#[derive(Debug)]
pub struct ReadbackBuffer<T> {
    id: BufferId,
    _marker: PhantomData<T>,
}

impl<T> ReadbackBuffer<T>
where
    T: Pod,
{
    pub fn new(
        device: &mut dyn RenderDevice,
        label: impl AsRef<str>,
        initial: T,
    ) -> Self {
        let label = label.as_ref();

        log::info!(
            "Allocating readback buffer `{label}`; ty={}",
            any::type_name::<T>(),
        );

        let id = device.create_buffer(
            &BufferDesc {
                label: label.into(),
                size: mem::size_of::<T>() as _,
                usage: wgpu::BufferUsages::MAP_READ
                    | wgpu::BufferUsages::COPY_DST,
            },
            Some(bytemuck::bytes_of(&initial)),
        );

        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Records a copy of `src`'s first `size_of::<T>()` bytes into this
    /// buffer.
    pub fn copy_from(&self, device: &mut dyn RenderDevice, src: BufferId) {
        device.copy_buffer(src, 0, self.id, 0, mem::size_of::<T>() as _);
    }

    pub fn read(&self, device: &mut dyn RenderDevice) -> T {
        let mut value = T::zeroed();

        device.read_buffer(self.id, 0, bytemuck::bytes_of_mut(&mut value));

        value
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        device.destroy_buffer(self.id);
    }
}
