use std::marker::PhantomData;
use std::{any, slice};

use bytemuck::Pod;

use crate::{
    BindingResource, BoundResource, BufferDesc, BufferId, RenderDevice,
};

/// Storage buffer that exists only on the GPU.
#[derive(Debug)]
pub struct StorageBuffer<T> {
    id: BufferId,
    size: usize,
    _marker: PhantomData<T>,
}

impl<T> StorageBuffer<T>
where
    T: StorageBufferable,
{
    pub fn new(
        device: &mut dyn RenderDevice,
        label: impl AsRef<str>,
        size: usize,
    ) -> Self {
        Self::create(device, label.as_ref(), size, None)
    }

    pub fn new_with_contents(
        device: &mut dyn RenderDevice,
        label: impl AsRef<str>,
        data: &T,
    ) -> Self {
        let data = data.data();

        Self::create(device, label.as_ref(), data.len(), Some(data))
    }

    fn create(
        device: &mut dyn RenderDevice,
        label: &str,
        size: usize,
        contents: Option<&[u8]>,
    ) -> Self {
        log::info!(
            "Allocating storage buffer `{label}`; ty={}, size={size}",
            any::type_name::<T>(),
        );

        let id = device.create_buffer(
            &BufferDesc {
                label: label.into(),
                size: size as _,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            },
            contents,
        );

        Self {
            id,
            size,
            _marker: PhantomData,
        }
    }

    pub fn write(&self, device: &mut dyn RenderDevice, data: &T) {
        device.write_buffer(self.id, 0, data.data());
    }
}

impl<T> StorageBuffer<T> {
    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn clear(&self, device: &mut dyn RenderDevice) {
        device.clear_buffer(self.id);
    }

    pub fn bind_readable(&self) -> BoundResource {
        BoundResource::readable(BindingResource::Buffer(self.id))
    }

    pub fn bind_writable(&self) -> BoundResource {
        BoundResource::writable(BindingResource::Buffer(self.id))
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        device.destroy_buffer(self.id);
    }
}

pub trait StorageBufferable {
    fn data(&self) -> &[u8];
}

impl StorageBufferable for u32 {
    fn data(&self) -> &[u8] {
        bytemuck::cast_slice(slice::from_ref(self))
    }
}

impl StorageBufferable for u64 {
    fn data(&self) -> &[u8] {
        bytemuck::cast_slice(slice::from_ref(self))
    }
}

impl StorageBufferable for f32 {
    fn data(&self) -> &[u8] {
        bytemuck::cast_slice(slice::from_ref(self))
    }
}

impl<T> StorageBufferable for Vec<T>
where
    T: Pod,
{
    fn data(&self) -> &[u8] {
        bytemuck::cast_slice(self)
    }
}
