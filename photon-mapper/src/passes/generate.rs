use glam::{uvec3, UVec2};

use crate::gpu::GeneratePassParams;
use crate::{
    LightTableBuffers, Pass, PhotonBuffers, PhotonCounter, Program,
    ProgramDesc, RenderDevice, ResourceState, Result, Texture,
};

/// Resources a generate dispatch writes to and reads from.
#[derive(Clone, Copy)]
pub struct GenerateInputs<'a> {
    pub populations: &'a [PhotonBuffers; 2],
    pub counter: &'a PhotonCounter,
    pub light_table: &'a LightTableBuffers,
    pub seeds: &'a Texture,
    pub culling: &'a Texture,
}

/// Traces photons from the lights and deposits them into both populations.
#[derive(Debug)]
pub struct GeneratePass {
    program: Program,
    pass: Option<Pass<GeneratePassParams>>,
}

impl GeneratePass {
    pub const PAYLOAD_SIZE: u32 = 80;

    pub fn new(device: &mut dyn RenderDevice) -> Result<Self> {
        let program = Program::new(
            device,
            ProgramDesc::raytracing(
                "photon_generate",
                "photon_generate.rt",
                Self::PAYLOAD_SIZE,
            ),
        )?;

        Ok(Self {
            program,
            pass: None,
        })
    }

    /// Records a generate dispatch over `dispatch` light-table cells.
    ///
    /// Counters are reset before and copied into the staging buffer after the
    /// dispatch, so the counts can be read back on the next frame.
    pub fn run(
        &mut self,
        device: &mut dyn RenderDevice,
        inputs: GenerateInputs,
        dispatch: UVec2,
        params: GeneratePassParams,
    ) {
        let [caustic, global] = inputs.populations;

        let pass = Pass::builder("photon_generate")
            .bind([
                ("gCausticAabb", &caustic.aabbs.bind_writable()),
                ("gCausticFlux", &caustic.flux.bind_writable()),
                ("gCausticDir", &caustic.dir.bind_writable()),
                ("gGlobalAabb", &global.aabbs.bind_writable()),
                ("gGlobalFlux", &global.flux.bind_writable()),
                ("gGlobalDir", &global.dir.bind_writable()),
                ("gPhotonCounter", &inputs.counter.bind_writable()),
            ])
            .bind([
                ("gLightSample", &inputs.light_table.cells.bind_readable()),
                (
                    "gActiveTriangles",
                    &inputs.light_table.active_triangles.bind_readable(),
                ),
                (
                    "gEmissiveInvPdf",
                    &inputs.light_table.emissive_inv_pdf.bind_readable(),
                ),
                ("gRndSeed", &inputs.seeds.bind_readable()),
                ("gCullingHash", &inputs.culling.bind_readable()),
            ])
            .build_cached(&mut self.pass, &self.program);

        inputs.counter.reset(device);

        // Previous iteration's collect pass must be done reading the photons
        for buffers in inputs.populations {
            buffers.transition(device, ResourceState::UnorderedAccess);
            buffers.clear(device);
        }

        pass.run(device, uvec3(dispatch.x, dispatch.y, 1), params);

        inputs.counter.schedule_readback(device);
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}
