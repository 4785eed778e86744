use glam::{uvec3, UVec2};
use log::info;

use crate::gpu::CollectPassParams;
use crate::{
    AccelId, BindingResource, BoundResource, GBuffer, Pass, PhotonBuffers,
    Program, ProgramDesc, RenderDevice, Result, TextureId,
};

/// How collect rays gather photons they intersect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectStrategy {
    /// When set, up to [`Self::max_photons`] photons are picked through
    /// reservoir sampling during traversal and shaded afterwards; otherwise
    /// every intersected photon is accumulated directly in the hit shader.
    pub stochastic: bool,

    pub max_photons: u32,
}

impl CollectStrategy {
    /// Accumulated radiance plus the number of intersected photons.
    const PAYLOAD_HEADER_SIZE: u32 = 16;

    pub fn payload_size(self) -> u32 {
        if self.stochastic {
            Self::PAYLOAD_HEADER_SIZE + 4 * (self.max_photons + 1)
        } else {
            Self::PAYLOAD_HEADER_SIZE
        }
    }
}

impl Default for CollectStrategy {
    fn default() -> Self {
        Self {
            stochastic: true,
            max_photons: 3,
        }
    }
}

/// Resources a collect dispatch reads from and writes to.
#[derive(Clone, Copy)]
pub struct CollectInputs<'a> {
    pub gbuffer: GBuffer,
    pub output: TextureId,

    /// Top-level structure over the photons; `None` when there's nothing to
    /// collect from.
    pub tlas: Option<AccelId>,

    pub populations: &'a [PhotonBuffers; 2],
}

/// Gathers photons around every G-buffer pixel into the output image.
#[derive(Debug)]
pub struct CollectPass {
    program: Program,
    strategy: CollectStrategy,
    pass: Option<Pass<CollectPassParams>>,
}

impl CollectPass {
    pub fn new(
        device: &mut dyn RenderDevice,
        strategy: CollectStrategy,
    ) -> Result<Self> {
        let program = Program::new(
            device,
            ProgramDesc::raytracing(
                "photon_collect",
                "photon_collect.rt",
                strategy.payload_size(),
            )
            .define("STOCHASTIC_COLLECT", strategy.stochastic as u32)
            .define("MAX_PHOTONS", strategy.max_photons),
        )?;

        Ok(Self {
            program,
            strategy,
            pass: None,
        })
    }

    pub fn strategy(&self) -> CollectStrategy {
        self.strategy
    }

    /// Recompiles the program if given strategy differs from the current
    /// one; on failure the current program is kept.
    pub fn set_strategy(
        &mut self,
        device: &mut dyn RenderDevice,
        strategy: CollectStrategy,
    ) -> Result<()> {
        if self.strategy == strategy {
            return Ok(());
        }

        info!("Recompiling collect program; strategy={strategy:?}");

        let new = Self::new(device, strategy)?;

        std::mem::replace(self, new).destroy(device);

        Ok(())
    }

    pub fn run(
        &mut self,
        device: &mut dyn RenderDevice,
        inputs: CollectInputs,
        size: UVec2,
        params: CollectPassParams,
    ) {
        if size.x == 0 || size.y == 0 {
            return;
        }

        let Some(tlas) = inputs.tlas.filter(|_| params.instance_mask() != 0)
        else {
            device.clear_texture(inputs.output);
            return;
        };

        let [caustic, global] = inputs.populations;
        let output = BoundResource::writable(BindingResource::Texture(inputs.output));

        let pass = Pass::builder("photon_collect")
            .bind([
                ("gPosW", &inputs.gbuffer.pos_w),
                ("gNormalW", &inputs.gbuffer.normal_w),
                ("gViewW", &inputs.gbuffer.view_w),
                ("gThpMatID", &inputs.gbuffer.thp_mat_id),
                ("gEmissive", &inputs.gbuffer.emissive),
                ("gPhotonImage", &output),
            ])
            .bind([
                ("gPhotonAS", &tlas),
                ("gCausticAabb", &caustic.aabbs.bind_readable()),
                ("gCausticFlux", &caustic.flux.bind_readable()),
                ("gCausticDir", &caustic.dir.bind_readable()),
                ("gGlobalAabb", &global.aabbs.bind_readable()),
                ("gGlobalFlux", &global.flux.bind_readable()),
                ("gGlobalDir", &global.dir.bind_readable()),
            ])
            .build_cached(&mut self.pass, &self.program);

        pass.run(device, uvec3(size.x, size.y, 1), params);
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}
