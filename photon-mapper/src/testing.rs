use std::sync::atomic::AtomicU32;

use fxhash::FxHashMap;
use glam::{UVec2, UVec3};

use crate::gpu::{self, GeneratePassParams, PhotonCounts, PhotonKind};
use crate::{
    AccelBuild, AccelBuildMode, AccelId, AccelInputs, Barrier, Binding,
    BindingResource,
    BufferDesc, BufferId, DeviceCaps, Dispatch, PrebuildInfo, ProgramDesc,
    ProgramId, RenderDevice, TextureDesc, TextureId,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateBuffer { id: BufferId, label: String, size: u64 },
    DestroyBuffer(BufferId),
    CreateTexture { id: TextureId, label: String, size: UVec2 },
    DestroyTexture(TextureId),
    WriteBuffer { buffer: BufferId, size: u64 },
    CopyBuffer { src: BufferId, dst: BufferId, size: u64 },
    ClearBuffer(BufferId),
    ClearTexture(TextureId),
    CreateAccel { id: AccelId, storage: BufferId, size: u64 },
    DestroyAccel(AccelId),
    BuildAccel(AccelBuild),
    Barrier(Barrier),
    CreateProgram { id: ProgramId, label: String },
    DestroyProgram(ProgramId),
    DispatchRays { label: String, size: UVec3 },
    DispatchCompute { label: String, size: UVec3 },
}

#[derive(Debug)]
struct MockBuffer {
    data: Vec<u8>,
}

#[derive(Debug)]
struct MockTexture {
    desc: TextureDesc,
    data: Vec<u8>,
}

/// In-memory [`RenderDevice`] that records every command it receives.
///
/// Commands take effect immediately: copies move bytes, clears zero them and
/// dispatching the photon generation program emulates the kernel's counter
/// protocol against [`Self::generate_demand`].
#[derive(Debug)]
pub struct RecordingDevice {
    pub caps: DeviceCaps,

    /// Label of a program whose compilation should fail.
    pub failing_program: Option<String>,

    /// Number of photons each population's kernel threads attempt to store
    /// per generate dispatch.
    pub generate_demand: PhotonCounts,

    /// Number of photons the emulated kernel actually stored during the most
    /// recent generate dispatch.
    pub generate_stored: PhotonCounts,

    pub commands: Vec<Command>,
    pub buffer_allocations: u32,
    pub texture_allocations: u32,

    buffers: FxHashMap<BufferId, MockBuffer>,
    textures: FxHashMap<TextureId, MockTexture>,
    accels: FxHashMap<AccelId, u64>,
    programs: FxHashMap<ProgramId, ProgramDesc>,
    params: FxHashMap<String, Vec<u8>>,
    bindings: FxHashMap<String, Vec<Binding>>,
    next_id: u32,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self {
            caps: DeviceCaps { raytracing: true },
            failing_program: None,
            generate_demand: PhotonCounts::default(),
            generate_stored: PhotonCounts::default(),
            commands: Default::default(),
            buffer_allocations: 0,
            texture_allocations: 0,
            buffers: Default::default(),
            textures: Default::default(),
            accels: Default::default(),
            programs: Default::default(),
            params: Default::default(),
            bindings: Default::default(),
            next_id: 1,
        }
    }
}

impl RecordingDevice {
    pub fn without_raytracing() -> Self {
        Self {
            caps: DeviceCaps { raytracing: false },
            ..Default::default()
        }
    }

    pub fn with_failing_program(label: impl ToString) -> Self {
        Self {
            failing_program: Some(label.to_string()),
            ..Default::default()
        }
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;

        self.next_id += 1;
        id
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_accels(&self) -> usize {
        self.accels.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn buffer_data(&self, id: BufferId) -> &[u8] {
        &self.buffers[&id].data
    }

    pub fn texture_desc(&self, id: TextureId) -> &TextureDesc {
        &self.textures[&id].desc
    }

    pub fn texture_data(&self, id: TextureId) -> &[u8] {
        &self.textures[&id].data
    }

    pub fn find_texture(&self, label: &str) -> Option<TextureId> {
        self.textures
            .iter()
            .find(|(_, tex)| tex.desc.label == label)
            .map(|(id, _)| *id)
    }

    /// Returns parameters of the most recent dispatch of given program.
    pub fn last_params<P>(&self, label: &str) -> Option<P>
    where
        P: bytemuck::Pod,
    {
        self.params
            .get(label)
            .map(|bytes| bytemuck::pod_read_unaligned(bytes))
    }

    /// Returns bindings of the most recent dispatch of given program.
    pub fn last_bindings(&self, label: &str) -> &[Binding] {
        self.bindings.get(label).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns resource bound under given name during the most recent
    /// dispatch of given program.
    pub fn bound(&self, label: &str, name: &str) -> Option<BindingResource> {
        self.last_bindings(label)
            .iter()
            .find(|binding| binding.name == name)
            .map(|binding| binding.resource)
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn dispatches(&self, label: &str) -> usize {
        self.commands
            .iter()
            .filter(|cmd| match cmd {
                Command::DispatchRays { label: l, .. }
                | Command::DispatchCompute { label: l, .. } => l == label,
                _ => false,
            })
            .count()
    }

    pub fn accel_builds(&self) -> Vec<AccelBuild> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::BuildAccel(build) => Some(*build),
                _ => None,
            })
            .collect()
    }

    fn record_dispatch(&mut self, dispatch: &Dispatch) -> String {
        let program = &self.programs[&dispatch.program];

        for binding in dispatch.bindings {
            let live = match binding.resource {
                BindingResource::Buffer(id) => self.buffers.contains_key(&id),
                BindingResource::Texture(id) => {
                    self.textures.contains_key(&id)
                }
                BindingResource::Accel(id) => self.accels.contains_key(&id),
            };

            assert!(
                live,
                "{}: `{}` is bound to a released resource",
                program.label, binding.name
            );
        }

        let label = program.label.clone();

        self.params.insert(label.clone(), dispatch.params.to_vec());
        self.bindings.insert(label.clone(), dispatch.bindings.to_vec());

        label
    }

    fn emulate_generate(&mut self, dispatch: &Dispatch) {
        let params: GeneratePassParams =
            bytemuck::pod_read_unaligned(dispatch.params);

        let counter = dispatch.bindings.iter().find_map(|binding| {
            match (binding.name, binding.resource) {
                ("gPhotonCounter", BindingResource::Buffer(id)) => Some(id),
                _ => None,
            }
        });

        let Some(counter) = counter else {
            return;
        };

        let mut counts: PhotonCounts =
            bytemuck::pod_read_unaligned(&self.buffers[&counter].data);

        let capacities =
            PhotonCounts::new(params.caustic_capacity, params.global_capacity);

        self.generate_stored = PhotonCounts::default();

        for kind in PhotonKind::ALL {
            let atomic = AtomicU32::new(counts.get(kind));
            let mut stored = 0;

            for _ in 0..self.generate_demand.get(kind) {
                if gpu::claim_slot_atomic(&atomic, capacities.get(kind))
                    .is_some()
                {
                    stored += 1;
                }
            }

            counts.set(kind, atomic.into_inner());
            self.generate_stored.set(kind, stored);
        }

        if let Some(buf) = self.buffers.get_mut(&counter) {
            buf.data.copy_from_slice(bytemuck::bytes_of(&counts));
        }
    }
}

impl RenderDevice for RecordingDevice {
    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDesc,
        contents: Option<&[u8]>,
    ) -> BufferId {
        let id = BufferId(self.next_id());
        let mut data = vec![0; desc.size as usize];

        if let Some(contents) = contents {
            data[..contents.len()].copy_from_slice(contents);
        }

        self.buffers.insert(id, MockBuffer { data });

        self.buffer_allocations += 1;

        self.commands.push(Command::CreateBuffer {
            id,
            label: desc.label.clone(),
            size: desc.size,
        });

        id
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        assert!(self.buffers.remove(&buffer).is_some(), "double free");

        self.commands.push(Command::DestroyBuffer(buffer));
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        contents: Option<&[u8]>,
    ) -> TextureId {
        assert!(desc.size.x > 0 && desc.size.y > 0);

        let id = TextureId(self.next_id());

        self.textures.insert(
            id,
            MockTexture {
                desc: desc.clone(),
                data: contents.map(|data| data.to_vec()).unwrap_or_default(),
            },
        );

        self.texture_allocations += 1;

        self.commands.push(Command::CreateTexture {
            id,
            label: desc.label.clone(),
            size: desc.size,
        });

        id
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        assert!(self.textures.remove(&texture).is_some(), "double free");

        self.commands.push(Command::DestroyTexture(texture));
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let buf = self.buffers.get_mut(&buffer).expect("unknown buffer");
        let offset = offset as usize;

        buf.data[offset..offset + data.len()].copy_from_slice(data);

        self.commands.push(Command::WriteBuffer {
            buffer,
            size: data.len() as _,
        });
    }

    fn copy_buffer(
        &mut self,
        src: BufferId,
        src_offset: u64,
        dst: BufferId,
        dst_offset: u64,
        size: u64,
    ) {
        let (src_offset, dst_offset, len) =
            (src_offset as usize, dst_offset as usize, size as usize);

        let data = self.buffers[&src].data[src_offset..src_offset + len].to_vec();

        self.buffers.get_mut(&dst).expect("unknown buffer").data
            [dst_offset..dst_offset + len]
            .copy_from_slice(&data);

        self.commands.push(Command::CopyBuffer { src, dst, size });
    }

    fn clear_buffer(&mut self, buffer: BufferId) {
        self.buffers
            .get_mut(&buffer)
            .expect("unknown buffer")
            .data
            .fill(0);

        self.commands.push(Command::ClearBuffer(buffer));
    }

    fn clear_texture(&mut self, texture: TextureId) {
        self.textures
            .get_mut(&texture)
            .expect("unknown texture")
            .data
            .fill(0);

        self.commands.push(Command::ClearTexture(texture));
    }

    fn read_buffer(&mut self, buffer: BufferId, offset: u64, out: &mut [u8]) {
        let offset = offset as usize;

        out.copy_from_slice(&self.buffers[&buffer].data[offset..][..out.len()]);
    }

    fn accel_prebuild_info(
        &mut self,
        inputs: &AccelInputs,
        mode: AccelBuildMode,
    ) -> PrebuildInfo {
        let (count, node_size) = match inputs {
            AccelInputs::BottomLevel { count, .. } => (*count as u64, 32),
            AccelInputs::TopLevel { count, .. } => (*count as u64, 128),
        };

        let node_size = match mode {
            AccelBuildMode::FastBuild => node_size,
            AccelBuildMode::FastTrace => node_size * 2,
        };

        PrebuildInfo {
            result_size: 100 + count * node_size,
            scratch_size: 50 + count * node_size / 2,
            update_scratch_size: 10 + count * 4,
        }
    }

    fn create_accel(
        &mut self,
        _label: &str,
        storage: BufferId,
        size: u64,
    ) -> AccelId {
        assert!(self.buffers.contains_key(&storage));

        let id = AccelId(self.next_id());

        self.accels.insert(id, 0x10000 + (id.0 as u64) * 0x1000);
        self.commands.push(Command::CreateAccel { id, storage, size });

        id
    }

    fn destroy_accel(&mut self, accel: AccelId) {
        assert!(self.accels.remove(&accel).is_some(), "double free");

        self.commands.push(Command::DestroyAccel(accel));
    }

    fn accel_address(&self, accel: AccelId) -> u64 {
        self.accels[&accel]
    }

    fn build_accel(&mut self, build: &AccelBuild) {
        assert!(self.accels.contains_key(&build.dst));
        assert!(self.buffers.contains_key(&build.scratch));

        self.commands.push(Command::BuildAccel(*build));
    }

    fn barrier(&mut self, barrier: Barrier) {
        self.commands.push(Command::Barrier(barrier));
    }

    fn create_program(
        &mut self,
        desc: &ProgramDesc,
    ) -> Result<ProgramId, String> {
        if self.failing_program.as_deref() == Some(desc.label.as_str()) {
            return Err(format!("{}: syntax error", desc.source));
        }

        let id = ProgramId(self.next_id());

        self.programs.insert(id, desc.clone());

        self.commands.push(Command::CreateProgram {
            id,
            label: desc.label.clone(),
        });

        Ok(id)
    }

    fn destroy_program(&mut self, program: ProgramId) {
        assert!(self.programs.remove(&program).is_some(), "double free");

        self.commands.push(Command::DestroyProgram(program));
    }

    fn dispatch_rays(&mut self, dispatch: &Dispatch) {
        let label = self.record_dispatch(dispatch);

        if label == "photon_generate" {
            self.emulate_generate(dispatch);
        }

        self.commands.push(Command::DispatchRays {
            label,
            size: dispatch.size,
        });
    }

    fn dispatch_compute(&mut self, dispatch: &Dispatch) {
        let label = self.record_dispatch(dispatch);

        self.commands.push(Command::DispatchCompute {
            label,
            size: dispatch.size,
        });
    }
}
