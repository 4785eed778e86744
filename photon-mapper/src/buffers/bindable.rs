use crate::{
    Access, AccelId, Binding, BindingResource, BufferId, TextureId,
};

/// Object that can be attached to a pass, e.g. a buffer or a texture
pub trait Bindable {
    fn bind(&self, name: &'static str) -> Binding;
}

/// Resource together with the way a pass is going to access it; produced by
/// `bind_readable()` / `bind_writable()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundResource {
    pub resource: BindingResource,
    pub access: Access,
}

impl BoundResource {
    pub fn readable(resource: BindingResource) -> Self {
        Self {
            resource,
            access: Access::Read,
        }
    }

    pub fn writable(resource: BindingResource) -> Self {
        Self {
            resource,
            access: Access::ReadWrite,
        }
    }
}

impl Bindable for BoundResource {
    fn bind(&self, name: &'static str) -> Binding {
        Binding {
            name,
            resource: self.resource,
            access: self.access,
        }
    }
}

/// Textures supplied by the host (G-buffer channels, output image) are bound
/// as-is; their access is decided by the pass reflection.
impl Bindable for TextureId {
    fn bind(&self, name: &'static str) -> Binding {
        BoundResource::readable(BindingResource::Texture(*self)).bind(name)
    }
}

impl Bindable for BufferId {
    fn bind(&self, name: &'static str) -> Binding {
        BoundResource::readable(BindingResource::Buffer(*self)).bind(name)
    }
}

impl Bindable for AccelId {
    fn bind(&self, name: &'static str) -> Binding {
        BoundResource::readable(BindingResource::Accel(*self)).bind(name)
    }
}
