use fxhash::FxHashMap;
use glam::{UVec2, UVec3};
use serde::{Deserialize, Serialize};

/// Handle of a buffer allocated through [`RenderDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Handle of a 2D texture allocated through [`RenderDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Handle of an acceleration structure (bottom- or top-level).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AccelId(pub u32);

/// Handle of a compiled compute or raytracing program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceCaps {
    pub raytracing: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDesc {
    pub label: String,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: String,
    pub size: UVec2,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Buffer(BufferId),
    Texture(TextureId),
    Accel(AccelId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    CopySource,
    CopyDest,
    UnorderedAccess,
    ShaderResource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Barrier {
    /// Completes all pending writes to the resource before it's accessed
    /// again.
    Uav(Resource),

    /// Completes a pending acceleration structure build before the structure
    /// is used as a build input or traversed.
    AccelBuild(AccelId),

    Transition {
        resource: Resource,
        state: ResourceState,
    },
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum AccelBuildMode {
    #[default]
    FastBuild,
    FastTrace,
}

impl AccelBuildMode {
    pub const ALL: [Self; 2] = [Self::FastBuild, Self::FastTrace];

    pub fn name(self) -> &'static str {
        match self {
            AccelBuildMode::FastBuild => "Fast Build",
            AccelBuildMode::FastTrace => "Fast Trace",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccelInputs {
    /// Procedural geometry consisting of `count` AABBs laid out `stride`
    /// bytes apart.
    BottomLevel {
        aabbs: BufferId,
        count: u32,
        stride: u32,
    },

    TopLevel {
        instances: BufferId,
        count: u32,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrebuildInfo {
    pub result_size: u64,
    pub scratch_size: u64,
    pub update_scratch_size: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccelBuild {
    pub inputs: AccelInputs,
    pub mode: AccelBuildMode,
    pub dst: AccelId,
    pub scratch: BufferId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramKind {
    Compute,

    Raytracing {
        max_payload_size: u32,
        max_attribute_size: u32,
        max_recursion_depth: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramDesc {
    pub label: String,
    pub source: &'static str,
    pub kind: ProgramKind,
    pub defines: FxHashMap<String, String>,
}

impl ProgramDesc {
    pub fn compute(label: impl ToString, source: &'static str) -> Self {
        Self {
            label: label.to_string(),
            source,
            kind: ProgramKind::Compute,
            defines: Default::default(),
        }
    }

    pub fn raytracing(
        label: impl ToString,
        source: &'static str,
        max_payload_size: u32,
    ) -> Self {
        Self {
            label: label.to_string(),
            source,
            kind: ProgramKind::Raytracing {
                max_payload_size,
                max_attribute_size: 8,
                max_recursion_depth: 2,
            },
            defines: Default::default(),
        }
    }

    pub fn define(mut self, name: impl ToString, value: impl ToString) -> Self {
        self.defines.insert(name.to_string(), value.to_string());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingResource {
    Buffer(BufferId),
    Texture(TextureId),
    Accel(AccelId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    ReadWrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub name: &'static str,
    pub resource: BindingResource,
    pub access: Access,
}

#[derive(Clone, Copy, Debug)]
pub struct Dispatch<'a> {
    pub program: ProgramId,
    pub bindings: &'a [Binding],
    pub params: &'a [u8],
    pub size: UVec3,
}

/// Low-level graphics services the photon mapper drives.
///
/// Commands are recorded in call order into the frame's command stream;
/// nothing here blocks except [`Self::read_buffer()`], which observes the
/// contents a staging buffer had at the end of the previous submission.
pub trait RenderDevice {
    fn caps(&self) -> DeviceCaps;

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        contents: Option<&[u8]>,
    ) -> BufferId;

    fn destroy_buffer(&mut self, buffer: BufferId);

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        contents: Option<&[u8]>,
    ) -> TextureId;

    fn destroy_texture(&mut self, texture: TextureId);

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);

    fn copy_buffer(
        &mut self,
        src: BufferId,
        src_offset: u64,
        dst: BufferId,
        dst_offset: u64,
        size: u64,
    );

    fn clear_buffer(&mut self, buffer: BufferId);

    fn clear_texture(&mut self, texture: TextureId);

    fn read_buffer(&mut self, buffer: BufferId, offset: u64, out: &mut [u8]);

    fn accel_prebuild_info(
        &mut self,
        inputs: &AccelInputs,
        mode: AccelBuildMode,
    ) -> PrebuildInfo;

    fn create_accel(
        &mut self,
        label: &str,
        storage: BufferId,
        size: u64,
    ) -> AccelId;

    fn destroy_accel(&mut self, accel: AccelId);

    /// Returns the address top-level instances refer to this structure by.
    fn accel_address(&self, accel: AccelId) -> u64;

    fn build_accel(&mut self, build: &AccelBuild);

    fn barrier(&mut self, barrier: Barrier);

    /// Compiles a program; on failure returns the compiler's diagnostic.
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, String>;

    fn destroy_program(&mut self, program: ProgramId);

    fn dispatch_rays(&mut self, dispatch: &Dispatch);

    fn dispatch_compute(&mut self, dispatch: &Dispatch);
}
