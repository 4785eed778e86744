use egui::{ComboBox, DragValue, Grid, Slider};

use super::PhotonMapper;
use crate::gpu::CullingHash;
use crate::{
    AccelBuildMode, InfoPrecision, LightSamplingMode, PhotonMapperConfig,
    SamplePattern,
};

/// Values edited in the UI that take effect only after pressing "Apply".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct UiState {
    photons: u32,
    caustic_buffer_size: u32,
    global_buffer_size: u32,
}

impl UiState {
    pub fn new(config: &PhotonMapperConfig) -> Self {
        Self {
            photons: config.photons,
            caustic_buffer_size: config.caustic_buffer_size,
            global_buffer_size: config.global_buffer_size,
        }
    }

    pub fn sync_buffer_sizes(&mut self, config: &PhotonMapperConfig) {
        self.caustic_buffer_size = config.caustic_buffer_size;
        self.global_buffer_size = config.global_buffer_size;
    }
}

impl PhotonMapper {
    pub(super) fn draw_ui(&mut self, ui: &mut egui::Ui) {
        let status = self.status();

        Grid::new("photon_mapper_status").show(ui, |ui| {
            ui.label("Iterations");
            ui.label(status.iteration.to_string());
            ui.end_row();

            ui.label("Caustic Photons");
            ui.label(format!(
                "{} / {}",
                status.photons.caustic, status.capacities.caustic
            ))
            .on_hover_text("Photons stored / caustic buffer capacity");
            ui.end_row();

            ui.label("Global Photons");
            ui.label(format!(
                "{} / {}",
                status.photons.global, status.capacities.global
            ))
            .on_hover_text("Photons stored / global buffer capacity");
            ui.end_row();

            ui.label("Radii");
            ui.label(format!(
                "caustic {:.5}, global {:.5}",
                status.caustic_radius, status.global_radius
            ));
            ui.end_row();

            ui.label("Realized Photons");
            ui.label(format!(
                "{} ({}x{})",
                status.realized_photons,
                status.dispatch_size.x,
                status.dispatch_size.y
            ));
            ui.end_row();
        });

        ui.separator();

        Grid::new("photon_mapper_sizes").show(ui, |ui| {
            ui.label("Number Photons");
            ui.add(DragValue::new(&mut self.ui.photons).speed(1000));
            ui.end_row();

            ui.label("Size Caustic Buffer");
            ui.add(DragValue::new(&mut self.ui.caustic_buffer_size).speed(1000));
            ui.end_row();

            ui.label("Size Global Buffer");
            ui.add(DragValue::new(&mut self.ui.global_buffer_size).speed(1000));
            ui.end_row();
        });

        ui.horizontal(|ui| {
            if ui.button("Apply").clicked() {
                self.config.photons = self.ui.photons;
                self.config.caustic_buffer_size = self.ui.caustic_buffer_size;
                self.config.global_buffer_size = self.ui.global_buffer_size;
            }

            if ui
                .button("Fit Buffers")
                .on_hover_text(
                    "Resizes both buffers to the last photon counts times the \
                     overestimate factor",
                )
                .clicked()
            {
                self.fit_buffers();
            }
        });

        let config = &mut self.config;

        ui.add(
            Slider::new(&mut config.overestimate_factor, 1.0..=2.0)
                .text("Overestimate Factor"),
        );

        ui.checkbox(&mut config.use_sppm, "Use SPPM");

        if config.use_sppm {
            ui.add(
                Slider::new(&mut config.global_alpha, 0.1..=1.0)
                    .text("Global Alpha"),
            );

            ui.add(
                Slider::new(&mut config.caustic_alpha, 0.1..=1.0)
                    .text("Caustic Alpha"),
            );
        }

        ui.add(
            Slider::new(
                &mut config.max_bounces,
                1..=PhotonMapperConfig::MAX_BOUNCES,
            )
            .text("Max Recursion Depth"),
        );

        ui.collapsing("Radius Options", |ui| {
            let min_start = config.radius_floor.max(0.0001);

            ui.add(
                Slider::new(&mut config.caustic_radius_start, min_start..=1.0)
                    .logarithmic(true)
                    .text("Caustic Radius Start"),
            );

            ui.add(
                Slider::new(&mut config.global_radius_start, min_start..=1.0)
                    .logarithmic(true)
                    .text("Global Radius Start"),
            );

            // Radii never grow, so the floor stays below both start radii
            let max_floor = config
                .caustic_radius_start
                .min(config.global_radius_start)
                .clamp(0.00001, 0.01);

            ui.add(
                Slider::new(&mut config.radius_floor, 0.00001..=max_floor)
                    .logarithmic(true)
                    .text("Radius Floor"),
            );
        });

        ui.collapsing("Material Options", |ui| {
            ui.add(
                Slider::new(&mut config.rejection_probability, 0.0..=0.99)
                    .text("Russian Roulette"),
            )
            .on_hover_text("Probability of terminating a photon per bounce");

            ui.add(
                Slider::new(&mut config.emissive_scale, 0.0..=10.0)
                    .text("Emissive Scale"),
            );

            ui.add(
                Slider::new(&mut config.spec_rough_cutoff, 0.0..=1.0)
                    .text("Specular Roughness Cutoff"),
            );

            ui.add(
                Slider::new(&mut config.emissive_cutoff, 0.0..=10.0)
                    .text("Emissive Cutoff"),
            );

            ui.checkbox(&mut config.alpha_test, "Alpha Test");
            ui.checkbox(
                &mut config.adjust_shading_normals,
                "Adjust Shading Normals",
            );
        });

        ui.collapsing("Culling Options", |ui| {
            ui.checkbox(&mut config.culling, "Enable Photon Culling");

            if config.culling {
                ui.add(
                    Slider::new(
                        &mut config.culling_hash_bits,
                        CullingHash::MIN_BITS..=CullingHash::MAX_BITS,
                    )
                    .text("Culling Hash Bits"),
                );
            }
        });

        ui.collapsing("Acceleration Structure Options", |ui| {
            ComboBox::from_label("Build Mode")
                .selected_text(config.accel_build_mode.name())
                .show_ui(ui, |ui| {
                    for mode in AccelBuildMode::ALL {
                        ui.selectable_value(
                            &mut config.accel_build_mode,
                            mode,
                            mode.name(),
                        );
                    }
                });
        });

        ui.collapsing("Light Table Options", |ui| {
            ComboBox::from_label("Sampling Mode")
                .selected_text(config.light_sampling_mode.name())
                .show_ui(ui, |ui| {
                    for mode in LightSamplingMode::ALL {
                        ui.selectable_value(
                            &mut config.light_sampling_mode,
                            mode,
                            mode.name(),
                        );
                    }
                });
        });

        ui.collapsing("Collect Options", |ui| {
            ui.checkbox(&mut config.collect_global, "Collect Global Photons");
            ui.checkbox(&mut config.collect_caustic, "Collect Caustic Photons");
            ui.checkbox(&mut config.stochastic_collect, "Stochastic Collection");

            if config.stochastic_collect {
                ui.add(
                    Slider::new(
                        &mut config.stochastic_max_photons,
                        1..=PhotonMapperConfig::MAX_STOCHASTIC_PHOTONS,
                    )
                    .text("Max Photons per Query"),
                );
            }

            ComboBox::from_label("Info Texture Precision")
                .selected_text(config.info_precision.name())
                .show_ui(ui, |ui| {
                    for precision in InfoPrecision::ALL {
                        ui.selectable_value(
                            &mut config.info_precision,
                            precision,
                            precision.name(),
                        );
                    }
                });
        });

        ui.collapsing("Camera", |ui| {
            ComboBox::from_label("Sample Pattern")
                .selected_text(config.sample_pattern.name())
                .show_ui(ui, |ui| {
                    for pattern in SamplePattern::ALL {
                        ui.selectable_value(
                            &mut config.sample_pattern,
                            pattern,
                            pattern.name(),
                        );
                    }
                });

            ui.add(
                Slider::new(&mut config.sample_count, 1..=64)
                    .text("Sample Count"),
            );
        });

        ui.separator();

        ui.checkbox(&mut config.always_reset, "Always Reset Iterations");

        ui.horizontal(|ui| {
            ui.checkbox(&mut config.use_timer, "Stop After (s)");
            ui.add_enabled(
                config.use_timer,
                DragValue::new(&mut config.timer_seconds)
                    .clamp_range(1.0..=86_400.0),
            );
        });

        ui.horizontal(|ui| {
            ui.checkbox(&mut config.use_max_iterations, "Max Iterations");
            ui.add_enabled(
                config.use_max_iterations,
                DragValue::new(&mut config.max_iterations)
                    .clamp_range(1..=u32::MAX),
            );
        });

        if ui.button("Reset Iterations").clicked() {
            self.reset_iterations();
        }
    }
}
