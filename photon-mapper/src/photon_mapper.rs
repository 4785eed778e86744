mod ui;

use std::mem;
use std::time::{Duration, Instant};

use glam::UVec2;
use log::{debug, error, info, warn};

use crate::gpu::{
    self, CollectPassParams, CullingHash, GeneratePassParams, PhotonCounts,
};
use crate::utils::measure;
use crate::{
    Channel, CollectInputs, CullingTexture, Error, FrameContext,
    GenerateInputs, IterationController, IterationLimits, LightSettings,
    LightTable, LightTableBuffers, PhotonAccel, PhotonBufferManager,
    PhotonCounter, PhotonMapperConfig, PhotonPasses, Radii, Reflection,
    RefreshFlags, RenderDevice, RenderPass, ResourceState, Result,
    SamplePattern, Scene, SeedProvider, OutputSize,
};

/// Light table together with what it was built from.
#[derive(Debug)]
struct LightTableState {
    lights_generation: u64,
    settings: LightSettings,
    table: LightTable,

    /// `None` if the table is empty.
    buffers: Option<LightTableBuffers>,
}

impl LightTableState {
    fn destroy(self, device: &mut dyn RenderDevice) {
        if let Some(buffers) = self.buffers {
            buffers.destroy(device);
        }
    }
}

/// Everything that lives on the GPU; exists only while a scene is loaded.
#[derive(Debug)]
struct GpuState {
    passes: PhotonPasses,
    counter: PhotonCounter,
    photons: PhotonBufferManager,
    accel: PhotonAccel,
    culling: CullingTexture,
    light_table: Option<LightTableState>,

    /// Whether the counter's staging buffer holds counts of a generate pass
    /// that hasn't been read back yet.
    readback_pending: bool,
}

impl GpuState {
    fn new(
        device: &mut dyn RenderDevice,
        config: &PhotonMapperConfig,
    ) -> Result<Self> {
        let passes = PhotonPasses::new(device, config.collect_strategy())?;
        let mut photons = PhotonBufferManager::default();

        photons.set_precision(device, config.info_precision);

        Ok(Self {
            passes,
            counter: PhotonCounter::new(device),
            photons,
            accel: PhotonAccel::new(config.accel_build_mode),
            culling: CullingTexture::new(device, culling_hash(config)),
            light_table: None,
            readback_pending: false,
        })
    }

    fn destroy(mut self, device: &mut dyn RenderDevice) {
        self.passes.destroy(device);
        self.counter.destroy(device);
        self.photons.release(device);
        self.accel.release(device);
        self.culling.destroy(device);

        if let Some(light_table) = self.light_table {
            light_table.destroy(device);
        }
    }
}

/// Snapshot of the photon mapper's progress, as shown in the UI.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhotonMapperStatus {
    pub iteration: u32,

    /// Photons stored by the most recently read-back generate pass; never
    /// larger than the capacities that pass ran with.
    pub photons: PhotonCounts,

    pub capacities: PhotonCounts,
    pub caustic_radius: f32,
    pub global_radius: f32,
    pub realized_photons: u32,
    pub dispatch_size: UVec2,
}

/// Progressive photon mapper: every frame emits a fresh batch of photons,
/// gathers them around the visible surfaces and shrinks the gather radii.
#[derive(Debug)]
pub struct PhotonMapper {
    /// Configuration as edited through the UI or scripting.
    config: PhotonMapperConfig,

    /// Configuration the GPU state currently reflects.
    applied: PhotonMapperConfig,

    ui: ui::UiState,
    iteration: IterationController,
    radii: Radii,
    seeds: SeedProvider,
    gpu: Option<GpuState>,
    status: PhotonMapperStatus,

    /// Demand observed by the most recently read-back generate pass.
    last_demand: Option<PhotonCounts>,

    options_changed: bool,
    fit_requested: bool,

    /// Set after a fatal error; cleared by the next scene change.
    disabled: bool,

    warned_no_lights: bool,
    overflowed: bool,
}

impl PhotonMapper {
    pub fn new(config: PhotonMapperConfig) -> Result<Self> {
        Self::with_seeds(config, SeedProvider::from_entropy())
    }

    pub fn with_seeds(
        config: PhotonMapperConfig,
        seeds: SeedProvider,
    ) -> Result<Self> {
        config.validate()?;

        let mut iteration = IterationController::new();

        iteration.set_always_reset(config.always_reset);
        iteration.set_limits(iteration_limits(&config));

        Ok(Self {
            ui: ui::UiState::new(&config),
            applied: config.clone(),
            radii: start_radii(&config),
            config,
            iteration,
            seeds,
            gpu: None,
            status: Default::default(),
            last_demand: None,
            options_changed: false,
            fit_requested: false,
            disabled: false,
            warned_no_lights: false,
            overflowed: false,
        })
    }

    pub fn from_dictionary(dict: serde_json::Value) -> Result<Self> {
        Self::new(PhotonMapperConfig::from_dictionary(dict)?)
    }

    pub fn config(&self) -> &PhotonMapperConfig {
        &self.config
    }

    /// Replaces the configuration; changes get applied on the next
    /// [`RenderPass::execute()`].
    pub fn set_config(&mut self, config: PhotonMapperConfig) -> Result<()> {
        config.validate()?;

        self.ui = ui::UiState::new(&config);
        self.config = config;

        Ok(())
    }

    pub fn status(&self) -> PhotonMapperStatus {
        PhotonMapperStatus {
            iteration: self.iteration.frame_count(),
            caustic_radius: self.radii.caustic,
            global_radius: self.radii.global,
            ..self.status
        }
    }

    pub fn radii(&self) -> Radii {
        self.radii
    }

    /// Camera jitter the host should apply while this pass is active.
    pub fn jitter(&self) -> (SamplePattern, u32) {
        (self.config.sample_pattern, self.config.sample_count)
    }

    /// Restarts the accumulation on the next frame.
    pub fn reset_iterations(&mut self) {
        self.iteration.request_reset();
    }

    /// Resizes both photon buffers to fit the last observed photon counts
    /// (plus the overestimate factor) on the next frame.
    pub fn fit_buffers(&mut self) {
        self.fit_requested = true;
    }

    fn release(&mut self, device: &mut dyn RenderDevice) {
        if let Some(gpu) = self.gpu.take() {
            gpu.destroy(device);
        }

        self.seeds.release(device);
    }

    /// Consumes photon counts of the previous frame's generate pass.
    fn read_back(&mut self, device: &mut dyn RenderDevice) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        if !mem::take(&mut gpu.readback_pending) {
            return;
        }

        let demand = gpu.counter.read(device);
        let capacities = gpu.photons.capacities();

        debug!("Photon demand: {demand:?}, capacities: {capacities:?}");

        self.last_demand = Some(demand);
        self.status.photons = demand.stored(capacities);

        let overflowed = demand.caustic > capacities.caustic
            || demand.global > capacities.global;

        if overflowed && !self.overflowed {
            warn!(
                "Photon buffers overflowed; demand={demand:?}, \
                 capacities={capacities:?}"
            );
        }

        self.overflowed = overflowed;

        let factor = self.config.overestimate_factor;

        if let Some(grown) = gpu.photons.maybe_grow(demand, factor) {
            // Automatic growth doesn't invalidate the accumulation
            for config in [&mut self.config, &mut self.applied] {
                config.caustic_buffer_size = grown.caustic;
                config.global_buffer_size = grown.global;
            }

            self.ui.sync_buffer_sizes(&self.config);
        }

        if mem::take(&mut self.fit_requested) {
            if let Some(fit) = PhotonBufferManager::fit_to(demand, factor) {
                info!("Fitting photon buffers to {fit:?}");

                self.config.caustic_buffer_size = fit.caustic;
                self.config.global_buffer_size = fit.global;
                self.ui.sync_buffer_sizes(&self.config);
            }
        }
    }

    /// Brings the GPU state in line with the current configuration.
    fn apply_config(&mut self, device: &mut dyn RenderDevice) -> Result<()> {
        let changes = self.config.changes_since(&self.applied);

        if !changes.any {
            return Ok(());
        }

        if let Err(err) = self.config.validate() {
            warn!("Reverting configuration change: {err}");

            self.config = self.applied.clone();
            self.ui = ui::UiState::new(&self.config);

            return Ok(());
        }

        debug!("Applying configuration changes: {changes:?}");

        self.iteration.set_always_reset(self.config.always_reset);
        self.iteration.set_limits(iteration_limits(&self.config));
        self.options_changed = true;

        if let Some(gpu) = &mut self.gpu {
            if changes.collect_program {
                let strategy = self.config.collect_strategy();

                if let Err(err) =
                    gpu.passes.collect.set_strategy(device, strategy)
                {
                    self.config.stochastic_collect =
                        self.applied.stochastic_collect;

                    self.config.stochastic_max_photons =
                        self.applied.stochastic_max_photons;

                    return Err(err);
                }
            }

            if changes.light_table {
                if let Some(light_table) = gpu.light_table.take() {
                    light_table.destroy(device);
                }
            }

            if changes.accel {
                gpu.accel.set_mode(device, self.config.accel_build_mode);
            }

            if changes.precision {
                gpu.photons.set_precision(device, self.config.info_precision);
            }

            if changes.culling {
                let culling = CullingTexture::new(
                    device,
                    culling_hash(&self.config),
                );

                mem::replace(&mut gpu.culling, culling).destroy(device);
            }
        }

        self.applied = self.config.clone();

        Ok(())
    }

    /// Makes sure the light table matches the scene's lights; returns
    /// whether there's anything to emit photons from.
    fn prepare_light_table(
        &mut self,
        device: &mut dyn RenderDevice,
        scene: &dyn Scene,
    ) -> bool {
        let Some(gpu) = &mut self.gpu else {
            return false;
        };

        let lights_generation = scene.lights_generation();
        let settings = scene.light_settings();

        let is_stale = gpu.light_table.as_ref().map_or(true, |state| {
            state.lights_generation != lights_generation
                || state.settings != settings
        });

        if is_stale {
            if let Some(state) = gpu.light_table.take() {
                state.destroy(device);
            }

            let lights = scene.lights();

            let table = LightTable::build(
                self.config.photons,
                &lights,
                settings,
                self.config.light_sampling_mode,
            );

            info!(
                "Built light table; requested={}, realized={}, size={:?}",
                self.config.photons,
                table.realized(),
                table.dispatch_size(),
            );

            let buffers = LightTableBuffers::new(device, &table);

            self.status.realized_photons = table.realized();
            self.status.dispatch_size = table.dispatch_size();

            gpu.light_table = Some(LightTableState {
                lights_generation,
                settings,
                table,
                buffers,
            });
        }

        let has_photons = gpu
            .light_table
            .as_ref()
            .is_some_and(|state| state.buffers.is_some());

        if has_photons {
            self.warned_no_lights = false;
        } else if !mem::replace(&mut self.warned_no_lights, true) {
            warn!("No photons to emit: the scene has no active lights");
        }

        has_photons
    }

    /// Records one photon mapping iteration; returns whether the photons
    /// got collected (and so whether the iteration counts).
    fn iterate(
        &mut self,
        device: &mut dyn RenderDevice,
        ctx: &FrameContext,
        scene: &dyn Scene,
    ) -> Result<bool> {
        let requested = PhotonCounts::new(
            self.config.caustic_buffer_size,
            self.config.global_buffer_size,
        );

        {
            let Some(gpu) = &mut self.gpu else {
                return Ok(false);
            };

            // Nothing gets recorded unless the whole iteration can run
            gpu.accel.check_support(device)?;

            if !gpu.photons.ensure_capacity(device, requested) {
                return Ok(false);
            }

            if gpu.photons.take_resized() {
                gpu.accel.invalidate(device);
                self.last_demand = None;
            }

            self.status.capacities = gpu.photons.capacities();
        }

        if !self.prepare_light_table(device, scene) {
            return Ok(false);
        }

        let last_demand = self.last_demand;
        let frame = self.iteration.frame_count();
        let seed = self.seeds.next_seed();
        let seeds = self.seeds.table(device, ctx.size);

        let Self {
            config, gpu, radii, ..
        } = self;

        let Some(gpu) = gpu else {
            return Ok(false);
        };

        let (Some(populations), Some(light_table)) =
            (gpu.photons.populations(), &gpu.light_table)
        else {
            return Ok(false);
        };

        let Some(light_buffers) = &light_table.buffers else {
            return Ok(false);
        };

        let table = &light_table.table;
        let capacities = gpu.photons.capacities();

        if config.culling {
            measure!(
                "culling",
                gpu.passes.culling.run(
                    device,
                    ctx.gbuffer.pos_w,
                    &gpu.culling,
                    ctx.size,
                    radii.global,
                )
            );
        }

        measure!(
            "generate",
            gpu.passes.generate.run(
                device,
                GenerateInputs {
                    populations,
                    counter: &gpu.counter,
                    light_table: light_buffers,
                    seeds,
                    culling: gpu.culling.texture(),
                },
                table.dispatch_size(),
                generate_params(
                    config,
                    *radii,
                    capacities,
                    table,
                    seed,
                    gpu.culling.hash().bits(),
                    light_table.settings,
                ),
            )
        );

        gpu.readback_pending = true;

        let counts = PhotonAccel::build_counts(
            last_demand,
            capacities,
            config.overestimate_factor,
        );

        let tlas = measure!(
            "accel",
            gpu.accel.build(device, populations, counts)
        )?;

        for buffers in populations {
            buffers.transition(device, ResourceState::ShaderResource);
        }

        measure!(
            "collect",
            gpu.passes.collect.run(
                device,
                CollectInputs {
                    gbuffer: ctx.gbuffer,
                    output: ctx.output,
                    tlas: Some(tlas),
                    populations,
                },
                ctx.size,
                collect_params(config, *radii, frame, seed),
            )
        );

        Ok(true)
    }
}

impl RenderPass for PhotonMapper {
    fn reflect(&self) -> Reflection {
        let output_size = match self.config.output_size {
            OutputSize::Default => None,
            OutputSize::Fixed => Some(self.config.fixed_output_size),
        };

        Reflection {
            inputs: vec![
                Channel::new("posW", "gPosW", "World position"),
                Channel::new("normalW", "gNormalW", "World shading normal"),
                Channel::new("viewW", "gViewW", "World view direction")
                    .optional(),
                Channel::new(
                    "thpMatID",
                    "gThpMatID",
                    "Path throughput and material id",
                ),
                Channel::new("emissive", "gEmissive", "Emissive radiance"),
            ],
            outputs: vec![Channel::new(
                "PhotonImage",
                "gPhotonImage",
                "Radiance gathered from photons",
            )
            .with_format(wgpu::TextureFormat::Rgba32Float)
            .with_size(output_size)],
        }
    }

    fn execute(
        &mut self,
        device: &mut dyn RenderDevice,
        ctx: &mut FrameContext,
    ) -> Result<()> {
        self.read_back(device);
        self.apply_config(device)?;

        if mem::take(&mut self.options_changed) {
            ctx.refresh_flags |= RefreshFlags::RENDER_OPTIONS_CHANGED;
            self.iteration.request_reset();
        }

        let Some(scene) = ctx.scene else {
            return Ok(());
        };

        if self.disabled || self.gpu.is_none() {
            return Ok(());
        }

        let updates = scene.updates();
        let now = Instant::now();

        if self.iteration.begin_frame(updates.camera_moved, now) {
            debug!("Photon mapper reset");
        }

        if self.iteration.frame_count() == 0 {
            self.radii = start_radii(&self.config);
        }

        if updates.geometry_changed {
            error!("Scene geometry changed; the photon mapper can't proceed");
            return Err(Error::GeometryChanged);
        }

        if self.iteration.is_finished(now) {
            return Ok(());
        }

        if ctx.size.x == 0 || ctx.size.y == 0 {
            return Ok(());
        }

        let collected = match self.iterate(device, ctx, scene) {
            Ok(collected) => collected,

            Err(err) => {
                if matches!(err, Error::RaytracingUnsupported) {
                    self.disabled = true;
                }

                return Err(err);
            }
        };

        if collected {
            let iteration = self.iteration.complete_iteration();

            if self.config.use_sppm {
                self.radii.shrink(
                    iteration,
                    self.config.caustic_estimator(),
                    self.config.global_estimator(),
                );
            }
        } else {
            device.clear_texture(ctx.output);
        }

        Ok(())
    }

    fn set_scene(
        &mut self,
        device: &mut dyn RenderDevice,
        scene: Option<&dyn Scene>,
    ) -> Result<()> {
        self.release(device);

        self.iteration.request_reset();
        self.status = Default::default();
        self.last_demand = None;
        self.disabled = false;
        self.warned_no_lights = false;
        self.overflowed = false;
        self.applied = self.config.clone();
        self.iteration.set_always_reset(self.config.always_reset);
        self.iteration.set_limits(iteration_limits(&self.config));

        let Some(scene) = scene else {
            return Ok(());
        };

        info!("Loading scene into the photon mapper");

        if scene.has_custom_geometry() {
            warn!(
                "Scene contains custom primitives; they are ignored during \
                 photon generation"
            );
        }

        self.gpu = Some(GpuState::new(device, &self.config)?);

        Ok(())
    }

    fn render_ui(&mut self, ui: &mut egui::Ui) {
        self.draw_ui(ui);
    }

    fn scripting_dictionary(&self) -> Result<serde_json::Value> {
        self.config.to_dictionary()
    }
}

fn start_radii(config: &PhotonMapperConfig) -> Radii {
    Radii {
        caustic: config.caustic_radius_start,
        global: config.global_radius_start,
    }
}

fn iteration_limits(config: &PhotonMapperConfig) -> IterationLimits {
    IterationLimits {
        duration: config
            .use_timer
            .then(|| Duration::from_secs_f32(config.timer_seconds)),
        max_iterations: config
            .use_max_iterations
            .then_some(config.max_iterations),
    }
}

fn culling_hash(config: &PhotonMapperConfig) -> CullingHash {
    if config.culling {
        CullingHash::new(config.culling_hash_bits)
    } else {
        CullingHash::new(CullingHash::MIN_BITS)
    }
}

fn generate_params(
    config: &PhotonMapperConfig,
    radii: Radii,
    capacities: PhotonCounts,
    table: &LightTable,
    seed: u32,
    culling_bits: u32,
    lights: LightSettings,
) -> GeneratePassParams {
    let mut flags = 0;

    for (enabled, flag) in [
        (config.alpha_test, GeneratePassParams::FLAG_ALPHA_TEST),
        (
            config.adjust_shading_normals,
            GeneratePassParams::FLAG_ADJUST_SHADING_NORMALS,
        ),
        (config.culling, GeneratePassParams::FLAG_CULLING),
        (
            config.info_precision == crate::InfoPrecision::Half,
            GeneratePassParams::FLAG_INFO_FLUX_16BIT,
        ),
        (lights.analytic_lights, GeneratePassParams::FLAG_ANALYTIC_LIGHTS),
        (lights.emissive_lights, GeneratePassParams::FLAG_EMISSIVE_LIGHTS),
        (lights.env_light, GeneratePassParams::FLAG_ENV_LIGHT),
    ] {
        if enabled {
            flags |= flag;
        }
    }

    GeneratePassParams {
        seed,
        max_bounces: config.max_bounces,
        caustic_capacity: capacities.caustic,
        global_capacity: capacities.global,
        caustic_radius: radii.caustic,
        global_radius: radii.global,
        rejection_probability: config.rejection_probability,
        spec_rough_cutoff: config.spec_rough_cutoff,
        emissive_scale: config.emissive_scale,
        emissive_cutoff: config.emissive_cutoff,
        analytic_inv_pdf: table.analytic_inv_pdf(),
        culling_bits,
        dispatch_width: table.width(),
        flags,
        ..Default::default()
    }
}

fn collect_params(
    config: &PhotonMapperConfig,
    radii: Radii,
    frame: u32,
    seed: u32,
) -> CollectPassParams {
    let mut flags = 0;

    for (enabled, flag) in [
        (config.collect_caustic, CollectPassParams::FLAG_COLLECT_CAUSTIC),
        (config.collect_global, CollectPassParams::FLAG_COLLECT_GLOBAL),
        (config.stochastic_collect, CollectPassParams::FLAG_STOCHASTIC),
        (
            config.info_precision == crate::InfoPrecision::Half,
            CollectPassParams::FLAG_INFO_FLUX_16BIT,
        ),
    ] {
        if enabled {
            flags |= flag;
        }
    }

    CollectPassParams {
        seed,
        frame,
        caustic_radius: radii.caustic,
        global_radius: radii.global,
        t_min: gpu::COLLECT_T_MIN,
        t_max: gpu::COLLECT_T_MAX,
        max_photons: config.stochastic_max_photons,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use glam::{uvec2, UVec2};

    use super::*;
    use crate::testing::{Command, RecordingDevice};
    use crate::{
        AccelBuild, AccelBuildMode, AccelInputs, AnalyticLight,
        EmissiveTriangle, GBuffer, InfoPrecision, RadiusEstimator,
        SceneLights, SceneUpdates, Texture, TextureId,
    };

    const SIZE: UVec2 = UVec2::new(64, 32);

    struct TestScene {
        lights: SceneLights,
        lights_generation: u64,
        lights_queries: Cell<u32>,
        updates: Cell<SceneUpdates>,
        custom_geometry: bool,
    }

    impl TestScene {
        fn new() -> Self {
            Self {
                lights: SceneLights {
                    analytic: Default::default(),
                    emissive_meshes: 1,
                    emissive_triangles: vec![
                        EmissiveTriangle {
                            flux: 1.0,
                            area: 1.0,
                        };
                        4
                    ],
                },
                lights_generation: 0,
                lights_queries: Cell::new(0),
                updates: Default::default(),
                custom_geometry: false,
            }
        }

        fn empty() -> Self {
            Self {
                lights: Default::default(),
                ..Self::new()
            }
        }
    }

    impl Scene for TestScene {
        fn lights(&self) -> SceneLights {
            self.lights_queries.set(self.lights_queries.get() + 1);
            self.lights.clone()
        }

        fn lights_generation(&self) -> u64 {
            self.lights_generation
        }

        fn updates(&self) -> SceneUpdates {
            self.updates.get()
        }

        fn has_custom_geometry(&self) -> bool {
            self.custom_geometry
        }

        fn light_settings(&self) -> LightSettings {
            Default::default()
        }
    }

    struct Fixture {
        device: RecordingDevice,
        target: PhotonMapper,
        scene: TestScene,
        gbuffer: GBuffer,
        output: TextureId,
        size: UVec2,
    }

    impl Fixture {
        fn new(config: PhotonMapperConfig) -> Self {
            Self::with(RecordingDevice::default(), config, TestScene::new())
        }

        fn with(
            mut device: RecordingDevice,
            config: PhotonMapperConfig,
            scene: TestScene,
        ) -> Self {
            let mut target =
                PhotonMapper::with_seeds(config, SeedProvider::new(1)).unwrap();

            let mut texture = |label: &str| {
                Texture::builder(label)
                    .with_size(SIZE)
                    .build(&mut device)
                    .id()
            };

            let gbuffer = GBuffer {
                pos_w: texture("pos_w"),
                normal_w: texture("normal_w"),
                view_w: texture("view_w"),
                thp_mat_id: texture("thp_mat_id"),
                emissive: texture("emissive"),
            };

            let output = texture("output");

            target.set_scene(&mut device, Some(&scene)).unwrap();

            Self {
                device,
                target,
                scene,
                gbuffer,
                output,
                size: SIZE,
            }
        }

        fn execute(&mut self) -> Result<RefreshFlags> {
            let mut ctx = FrameContext {
                scene: Some(&self.scene),
                size: self.size,
                gbuffer: self.gbuffer,
                output: self.output,
                refresh_flags: RefreshFlags::NONE,
            };

            self.target.execute(&mut self.device, &mut ctx)?;

            Ok(ctx.refresh_flags)
        }

        fn generate_params(&self) -> GeneratePassParams {
            self.device.last_params("photon_generate").unwrap()
        }

        fn gpu(&self) -> &GpuState {
            self.target.gpu.as_ref().unwrap()
        }
    }

    fn config() -> PhotonMapperConfig {
        PhotonMapperConfig {
            photons: 10_000,
            caustic_buffer_size: 1024,
            global_buffer_size: 2048,
            ..Default::default()
        }
    }

    fn bottom_level_counts(builds: &[AccelBuild]) -> Vec<u32> {
        builds
            .iter()
            .filter_map(|build| match build.inputs {
                AccelInputs::BottomLevel { count, .. } => Some(count),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn iteration() {
        let mut fixture = Fixture::new(config());

        fixture.device.take_commands();

        assert_eq!(RefreshFlags::NONE, fixture.execute().unwrap());

        for program in ["photon_culling", "photon_generate", "photon_collect"] {
            assert_eq!(1, fixture.device.dispatches(program), "{program}");
        }

        let status = fixture.target.status();

        assert_eq!(1, status.iteration);
        assert_eq!(PhotonCounts::new(1024, 2048), status.capacities);
        assert_eq!(10_000, status.realized_photons);
        assert_eq!(uvec2(32, 512), status.dispatch_size);

        assert!(fixture.device.commands.contains(&Command::DispatchRays {
            label: "photon_generate".into(),
            size: glam::uvec3(32, 512, 1),
        }));

        // Very first build covers the whole capacity
        assert_eq!(
            vec![1024, 2048],
            bottom_level_counts(&fixture.device.accel_builds())
        );

        let params = fixture.generate_params();

        assert_eq!(0.01, params.caustic_radius);
        assert_eq!(0.05, params.global_radius);
        assert_eq!(32, params.dispatch_width);
        assert!(params.has(GeneratePassParams::FLAG_ALPHA_TEST));
        assert!(params.has(GeneratePassParams::FLAG_CULLING));
        assert!(params.has(GeneratePassParams::FLAG_EMISSIVE_LIGHTS));
        assert!(!params.has(GeneratePassParams::FLAG_ENV_LIGHT));

        let params: CollectPassParams =
            fixture.device.last_params("photon_collect").unwrap();

        assert_eq!(0, params.frame);
        assert_eq!(gpu::COLLECT_T_MIN, params.t_min);
        assert_eq!(gpu::COLLECT_T_MAX, params.t_max);
        assert_eq!(0b11, params.instance_mask());
    }

    #[test]
    fn accel_is_sized_from_previous_counts() {
        let mut fixture = Fixture::new(config());

        fixture.device.generate_demand = PhotonCounts::new(100, 1000);
        fixture.execute().unwrap();
        fixture.device.take_commands();
        fixture.execute().unwrap();

        assert_eq!(
            vec![110, 1100],
            bottom_level_counts(&fixture.device.accel_builds())
        );

        assert!(!fixture.gpu().accel.last_build_full());
        assert_eq!(
            PhotonCounts::new(100, 1000),
            fixture.target.status().photons
        );
    }

    #[test]
    fn radii_shrink_every_iteration() {
        let mut fixture = Fixture::new(PhotonMapperConfig {
            caustic_radius_start: 0.04,
            global_radius_start: 0.1,
            caustic_alpha: 0.7,
            global_alpha: 0.7,
            ..config()
        });

        let estimator = RadiusEstimator {
            alpha: 0.7,
            floor: 0.0001,
        };

        let mut expected = Radii {
            caustic: 0.04,
            global: 0.1,
        };

        for iteration in 1..=10 {
            fixture.execute().unwrap();

            // Photons are generated with the radii from before the shrink
            assert_eq!(expected.global, fixture.generate_params().global_radius);

            expected.shrink(iteration, estimator, estimator);

            assert_eq!(expected, fixture.target.radii());
        }

        assert_eq!(10, fixture.target.status().iteration);
        assert!(fixture.target.radii().global > 0.0001);
    }

    #[test]
    fn radii_stay_without_sppm() {
        let mut fixture = Fixture::new(PhotonMapperConfig {
            use_sppm: false,
            ..config()
        });

        for _ in 0..5 {
            fixture.execute().unwrap();
        }

        assert_eq!(
            Radii {
                caustic: 0.01,
                global: 0.05,
            },
            fixture.target.radii()
        );
    }

    #[test]
    fn camera_motion_restores_start_radii() {
        let mut fixture = Fixture::new(config());

        for _ in 0..3 {
            fixture.execute().unwrap();
        }

        assert!(fixture.target.radii().global < 0.05);

        fixture.scene.updates.set(SceneUpdates {
            camera_moved: true,
            geometry_changed: false,
        });

        fixture.execute().unwrap();

        assert_eq!(0.05, fixture.generate_params().global_radius);
        assert_eq!(0.01, fixture.generate_params().caustic_radius);
        assert_eq!(1, fixture.target.status().iteration);

        fixture.scene.updates.set(Default::default());
        fixture.execute().unwrap();

        assert_eq!(2, fixture.target.status().iteration);
    }

    #[test]
    fn explicit_reset() {
        let mut fixture = Fixture::new(config());

        for _ in 0..3 {
            fixture.execute().unwrap();
        }

        fixture.target.reset_iterations();
        fixture.target.reset_iterations();
        fixture.execute().unwrap();

        assert_eq!(0.05, fixture.generate_params().global_radius);
        assert_eq!(1, fixture.target.status().iteration);
    }

    #[test]
    fn always_reset() {
        let mut fixture = Fixture::new(PhotonMapperConfig {
            always_reset: true,
            ..config()
        });

        for _ in 0..3 {
            fixture.execute().unwrap();

            assert_eq!(0.05, fixture.generate_params().global_radius);
            assert_eq!(1, fixture.target.status().iteration);
        }
    }

    #[test]
    fn option_change_raises_refresh_flag() {
        let mut fixture = Fixture::new(config());

        for _ in 0..3 {
            fixture.execute().unwrap();
        }

        fixture
            .target
            .set_config(PhotonMapperConfig {
                global_alpha: 0.5,
                ..config()
            })
            .unwrap();

        let flags = fixture.execute().unwrap();

        assert!(flags.contains(RefreshFlags::RENDER_OPTIONS_CHANGED));
        assert_eq!(1, fixture.target.status().iteration);
        assert_eq!(0.05, fixture.generate_params().global_radius);

        assert_eq!(RefreshFlags::NONE, fixture.execute().unwrap());
        assert_eq!(2, fixture.target.status().iteration);
    }

    #[test]
    fn invalid_edits_are_reverted() {
        let mut fixture = Fixture::new(config());

        fixture.execute().unwrap();

        let mut radius = fixture.target.radii().caustic;

        // Floor above the start radius, as the sliders could produce
        fixture.target.config.caustic_radius_start = 0.001;
        fixture.target.config.radius_floor = 0.005;

        for _ in 0..3 {
            fixture.execute().unwrap();

            let next = fixture.target.radii().caustic;

            assert!(next <= radius, "{next} > {radius}");
            radius = next;
        }

        assert_eq!(0.01, fixture.target.config().caustic_radius_start);
        assert_eq!(0.0001, fixture.target.config().radius_floor);
        assert_eq!(4, fixture.target.status().iteration);
    }

    #[test]
    fn exhausted_buffers_grow_and_rebuild_accel() {
        let mut fixture = Fixture::new(PhotonMapperConfig {
            caustic_buffer_size: 100_000,
            ..config()
        });

        fixture.device.generate_demand = PhotonCounts::new(150_000, 10);
        fixture.execute().unwrap();

        assert_eq!(100_352, fixture.target.status().capacities.caustic);
        assert_eq!(1, fixture.gpu().photons.allocations());

        fixture.device.take_commands();
        fixture.execute().unwrap();

        let status = fixture.target.status();

        assert_eq!(165_376, status.capacities.caustic);
        assert_eq!(165_376, fixture.target.config().caustic_buffer_size);
        assert_eq!(2048, status.capacities.global);
        assert_eq!(2, fixture.gpu().photons.allocations());

        // Structures were allocated against the old capacity, so they had to
        // be rebuilt from scratch
        assert!(fixture.gpu().accel.last_build_full());
        assert_eq!(2, fixture.gpu().accel.full_builds());

        assert!(fixture
            .device
            .commands
            .iter()
            .any(|cmd| matches!(cmd, Command::CreateAccel { .. })));

        // Growing doesn't restart the accumulation
        assert_eq!(2, status.iteration);

        fixture.device.take_commands();
        fixture.execute().unwrap();

        assert!(!fixture.gpu().accel.last_build_full());
        assert_eq!(2, fixture.gpu().photons.allocations());
    }

    #[test]
    fn dropped_photons_are_silent() {
        let mut fixture = Fixture::new(config());

        // 20% more than the caustic buffer holds
        fixture.device.generate_demand = PhotonCounts::new(1228, 100);

        fixture.execute().unwrap();

        assert_eq!(
            PhotonCounts::new(1024, 100),
            fixture.device.generate_stored
        );

        fixture.execute().unwrap();

        let status = fixture.target.status();

        assert_eq!(PhotonCounts::new(1024, 100), status.photons);
        assert_eq!(2, status.iteration);
        assert_eq!(2, fixture.device.dispatches("photon_collect"));
    }

    #[test]
    fn fit_buffers() {
        let mut fixture = Fixture::new(config());

        fixture.device.generate_demand = PhotonCounts::new(300, 700);
        fixture.execute().unwrap();

        fixture.target.fit_buffers();

        let flags = fixture.execute().unwrap();

        assert_eq!(330, fixture.target.config().caustic_buffer_size);
        assert_eq!(770, fixture.target.config().global_buffer_size);
        assert_eq!(
            PhotonCounts::new(512, 1024),
            fixture.target.status().capacities
        );

        assert!(flags.contains(RefreshFlags::RENDER_OPTIONS_CHANGED));
    }

    #[test]
    fn fit_buffers_needs_both_counts() {
        let mut fixture = Fixture::new(config());

        fixture.device.generate_demand = PhotonCounts::new(0, 700);
        fixture.execute().unwrap();

        fixture.target.fit_buffers();
        fixture.execute().unwrap();

        assert_eq!(1024, fixture.target.config().caustic_buffer_size);
        assert_eq!(2048, fixture.target.config().global_buffer_size);
    }

    #[test]
    fn scene_without_lights() {
        let mut fixture = Fixture::with(
            RecordingDevice::default(),
            config(),
            TestScene::empty(),
        );

        for _ in 0..2 {
            fixture.execute().unwrap();
        }

        assert_eq!(0, fixture.device.dispatches("photon_generate"));
        assert_eq!(0, fixture.device.dispatches("photon_collect"));
        assert_eq!(0, fixture.target.status().iteration);
        assert_eq!(0, fixture.target.status().realized_photons);

        assert!(fixture
            .device
            .commands
            .contains(&Command::ClearTexture(fixture.output)));
    }

    #[test]
    fn analytic_lights() {
        let mut scene = TestScene::new();

        scene.lights.analytic = vec![AnalyticLight { power: 1.0 }; 2];

        let mut fixture =
            Fixture::with(RecordingDevice::default(), config(), scene);

        fixture.execute().unwrap();

        let params = fixture.generate_params();

        assert!(params.analytic_inv_pdf > 0.0);
        assert!(params.has(GeneratePassParams::FLAG_ANALYTIC_LIGHTS));
        assert!(fixture.target.status().realized_photons >= 10_000);
    }

    #[test]
    fn light_changes_rebuild_light_table() {
        let mut fixture = Fixture::new(config());

        fixture.execute().unwrap();

        let table = fixture.device.find_texture("photon_light_table");

        fixture.scene.lights.emissive_triangles.pop();
        fixture.scene.lights_generation += 1;
        fixture.execute().unwrap();

        assert_ne!(table, fixture.device.find_texture("photon_light_table"));
        assert_eq!(2, fixture.target.status().iteration);

        fixture.target.set_config(PhotonMapperConfig {
            photons: 20_000,
            ..config()
        })
        .unwrap();

        fixture.execute().unwrap();

        assert_eq!(20_001, fixture.target.status().realized_photons);
        assert_eq!(1, fixture.target.status().iteration);
    }

    #[test]
    fn lights_are_queried_only_after_changes() {
        let mut fixture = Fixture::new(config());

        for _ in 0..5 {
            fixture.execute().unwrap();
        }

        assert_eq!(1, fixture.scene.lights_queries.get());

        // Same generation, so the edit stays unnoticed
        fixture.scene.lights.emissive_triangles.pop();
        fixture.execute().unwrap();

        assert_eq!(1, fixture.scene.lights_queries.get());
        assert_eq!(10_000, fixture.target.status().realized_photons);

        fixture.scene.lights_generation += 1;
        fixture.execute().unwrap();

        assert_eq!(2, fixture.scene.lights_queries.get());
        assert_eq!(10_002, fixture.target.status().realized_photons);
    }

    #[test]
    fn empty_screen() {
        let mut fixture = Fixture::new(config());

        fixture.size = UVec2::ZERO;
        fixture.execute().unwrap();

        assert_eq!(0, fixture.device.dispatches("photon_generate"));
        assert_eq!(0, fixture.target.status().iteration);
    }

    #[test]
    fn without_scene() {
        let mut fixture = Fixture::new(config());
        let mut ctx = FrameContext {
            scene: None,
            size: SIZE,
            gbuffer: fixture.gbuffer,
            output: fixture.output,
            refresh_flags: RefreshFlags::NONE,
        };

        fixture.target.execute(&mut fixture.device, &mut ctx).unwrap();

        assert_eq!(0, fixture.device.dispatches("photon_generate"));
    }

    #[test]
    fn geometry_change_is_fatal() {
        let mut fixture = Fixture::new(config());

        fixture.scene.updates.set(SceneUpdates {
            camera_moved: false,
            geometry_changed: true,
        });

        let err = fixture.execute().unwrap_err();

        assert!(matches!(err, Error::GeometryChanged));
        assert_eq!("execute", err.stage());
        assert_eq!(0, fixture.device.dispatches("photon_generate"));
    }

    #[test]
    fn raytracing_unsupported() {
        let mut fixture = Fixture::with(
            RecordingDevice::without_raytracing(),
            config(),
            TestScene::new(),
        );

        fixture.device.take_commands();

        let err = fixture.execute().unwrap_err();

        assert!(matches!(err, Error::RaytracingUnsupported));
        assert_eq!("acceleration structure build", err.stage());
        assert!(!fixture.gpu().readback_pending);

        let is_work = |cmd: &Command| {
            matches!(
                cmd,
                Command::DispatchRays { .. }
                    | Command::DispatchCompute { .. }
                    | Command::BuildAccel(_)
                    | Command::CreateAccel { .. }
            )
        };

        assert!(!fixture.device.commands.iter().any(is_work));

        // Reported once; afterwards the pass doesn't issue any work
        fixture.device.take_commands();
        fixture.execute().unwrap();

        assert!(!fixture.device.commands.iter().any(is_work));
        assert_eq!(0, fixture.target.status().iteration);
    }

    #[test]
    fn compile_failure() {
        let mut device =
            RecordingDevice::with_failing_program("photon_generate");

        let scene = TestScene::new();
        let mut target = PhotonMapper::new(config()).unwrap();
        let err = target.set_scene(&mut device, Some(&scene)).unwrap_err();

        assert!(matches!(err, Error::ProgramCompilation { .. }));
        assert_eq!("photon_generate", err.stage());
        assert_eq!(0, device.live_programs());
        assert_eq!(0, device.live_buffers());
    }

    #[test]
    fn collect_recompile_failure() {
        let mut fixture = Fixture::new(config());

        fixture.execute().unwrap();
        fixture.device.failing_program = Some("photon_collect".into());

        fixture
            .target
            .set_config(PhotonMapperConfig {
                stochastic_max_photons: 8,
                ..config()
            })
            .unwrap();

        let err = fixture.execute().unwrap_err();

        assert_eq!("photon_collect", err.stage());
        assert_eq!(3, fixture.target.config().stochastic_max_photons);

        // Previous program is still in place
        fixture.device.failing_program = None;
        fixture.execute().unwrap();

        assert_eq!(2, fixture.device.dispatches("photon_collect"));
    }

    #[test]
    fn rebuilds_after_config_changes() {
        let mut fixture = Fixture::new(config());

        fixture.execute().unwrap();
        fixture.device.take_commands();

        fixture
            .target
            .set_config(PhotonMapperConfig {
                accel_build_mode: AccelBuildMode::FastTrace,
                stochastic_max_photons: 8,
                info_precision: InfoPrecision::Full,
                culling_hash_bits: 12,
                ..config()
            })
            .unwrap();

        fixture.execute().unwrap();

        let commands = fixture.device.take_commands();

        assert!(commands.iter().any(|cmd| matches!(
            cmd,
            Command::CreateProgram { label, .. } if label == "photon_collect"
        )));

        assert!(fixture.gpu().accel.last_build_full());
        assert_eq!(AccelBuildMode::FastTrace, fixture.gpu().accel.mode());
        assert_eq!(12, fixture.gpu().culling.hash().bits());

        let flux = fixture.device.find_texture("photon_global_flux").unwrap();

        assert_eq!(
            wgpu::TextureFormat::Rgba32Float,
            fixture.device.texture_desc(flux).format
        );

        let params = fixture.generate_params();

        assert_eq!(12, params.culling_bits);
        assert!(!params.has(GeneratePassParams::FLAG_INFO_FLUX_16BIT));
    }

    #[test]
    fn collection_toggles() {
        let mut fixture = Fixture::new(PhotonMapperConfig {
            collect_caustic: false,
            ..config()
        });

        fixture.execute().unwrap();

        let params: CollectPassParams =
            fixture.device.last_params("photon_collect").unwrap();

        assert_eq!(
            gpu::PhotonKind::Global.instance_mask(),
            params.instance_mask()
        );

        // Generation is unaffected
        assert_eq!(1, fixture.device.dispatches("photon_generate"));
    }

    #[test]
    fn max_iterations() {
        let mut fixture = Fixture::new(PhotonMapperConfig {
            use_max_iterations: true,
            max_iterations: 3,
            ..config()
        });

        for _ in 0..5 {
            fixture.execute().unwrap();
        }

        assert_eq!(3, fixture.target.status().iteration);
        assert_eq!(3, fixture.device.dispatches("photon_generate"));

        fixture.target.reset_iterations();
        fixture.execute().unwrap();

        assert_eq!(1, fixture.target.status().iteration);
    }

    #[test]
    fn unloading_scene_releases_resources() {
        let mut fixture = Fixture::new(config());

        fixture.device.generate_demand = PhotonCounts::new(10, 10);

        for _ in 0..3 {
            fixture.execute().unwrap();
        }

        fixture.target.set_scene(&mut fixture.device, None).unwrap();

        assert_eq!(0, fixture.device.live_programs());
        assert_eq!(0, fixture.device.live_accels());
        assert_eq!(0, fixture.device.live_buffers());

        // Only the G-buffer and the output remain
        assert_eq!(6, fixture.device.live_textures());

        fixture.execute().unwrap();

        assert_eq!(3, fixture.device.dispatches("photon_generate"));
    }

    #[test]
    fn reloading_scene_restarts() {
        let mut fixture = Fixture::new(config());

        for _ in 0..3 {
            fixture.execute().unwrap();
        }

        let scene = TestScene {
            custom_geometry: true,
            ..TestScene::new()
        };

        fixture
            .target
            .set_scene(&mut fixture.device, Some(&scene))
            .unwrap();

        fixture.execute().unwrap();

        assert_eq!(1, fixture.target.status().iteration);
        assert_eq!(3, fixture.device.live_programs());
    }

    #[test]
    fn reflection() {
        let target = PhotonMapper::new(config()).unwrap();
        let reflection = target.reflect();

        let inputs: Vec<_> =
            reflection.inputs.iter().map(|input| input.name).collect();

        assert_eq!(
            vec!["posW", "normalW", "viewW", "thpMatID", "emissive"],
            inputs
        );

        assert_eq!(1, reflection.outputs.len());
        assert_eq!("PhotonImage", reflection.outputs[0].name);
        assert_eq!(
            Some(wgpu::TextureFormat::Rgba32Float),
            reflection.outputs[0].format
        );
        assert_eq!(None, reflection.outputs[0].size);

        let target = PhotonMapper::new(PhotonMapperConfig {
            output_size: OutputSize::Fixed,
            fixed_output_size: uvec2(320, 240),
            ..config()
        })
        .unwrap();

        assert_eq!(Some(uvec2(320, 240)), target.reflect().outputs[0].size);
    }

    #[test]
    fn scripting_dictionary() {
        let target = PhotonMapper::new(PhotonMapperConfig {
            sample_pattern: SamplePattern::Halton,
            sample_count: 8,
            ..config()
        })
        .unwrap();

        let dict = target.scripting_dictionary().unwrap();
        let target = PhotonMapper::from_dictionary(dict).unwrap();

        assert_eq!(10_000, target.config().photons);
        assert_eq!((SamplePattern::Halton, 8), target.jitter());
    }

    #[test]
    fn invalid_config() {
        let err = PhotonMapper::new(PhotonMapperConfig {
            global_alpha: 0.0,
            ..config()
        })
        .unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
