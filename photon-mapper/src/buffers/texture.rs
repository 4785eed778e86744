use glam::UVec2;

use crate::{
    BindingResource, BoundResource, RenderDevice, TextureDesc, TextureId,
};

#[derive(Debug)]
pub struct Texture {
    id: TextureId,
    size: UVec2,
    format: wgpu::TextureFormat,
}

impl Texture {
    pub fn builder(label: impl ToString) -> TextureBuilder {
        TextureBuilder {
            label: label.to_string(),
            size: Default::default(),
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn clear(&self, device: &mut dyn RenderDevice) {
        device.clear_texture(self.id);
    }

    pub fn bind_readable(&self) -> BoundResource {
        BoundResource::readable(BindingResource::Texture(self.id))
    }

    pub fn bind_writable(&self) -> BoundResource {
        BoundResource::writable(BindingResource::Texture(self.id))
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        device.destroy_texture(self.id);
    }
}

#[derive(Clone, Debug)]
pub struct TextureBuilder {
    label: String,
    size: UVec2,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
}

impl TextureBuilder {
    pub fn with_size(mut self, size: UVec2) -> Self {
        self.size = size;
        self
    }

    pub fn with_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_usage(mut self, usage: wgpu::TextureUsages) -> Self {
        self.usage |= usage;
        self
    }

    pub fn build(self, device: &mut dyn RenderDevice) -> Texture {
        self.create(device, None)
    }

    pub fn build_with_contents(
        self,
        device: &mut dyn RenderDevice,
        contents: &[u8],
    ) -> Texture {
        self.create(device, Some(contents))
    }

    fn create(
        self,
        device: &mut dyn RenderDevice,
        contents: Option<&[u8]>,
    ) -> Texture {
        log::info!(
            "Allocating texture `{}`; size={:?}, format={:?}",
            self.label,
            self.size,
            self.format,
        );

        let id = device.create_texture(
            &TextureDesc {
                label: self.label,
                size: self.size,
                format: self.format,
                usage: self.usage,
            },
            contents,
        );

        Texture {
            id,
            size: self.size,
            format: self.format,
        }
    }
}
