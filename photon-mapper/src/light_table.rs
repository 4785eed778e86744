use glam::{uvec2, UVec2};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::gpu::{self, LightSample, LIGHT_BLOCK_SIZE};
use crate::{
    LightSettings, RenderDevice, SceneLights, StorageBuffer, Texture,
};

/// Weight emissive photons get distributed by.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum LightSamplingMode {
    /// Proportionally to the triangle's radiant flux.
    #[default]
    Power,

    /// Proportionally to the triangle's surface area.
    Area,
}

impl LightSamplingMode {
    pub const ALL: [Self; 2] = [Self::Power, Self::Area];

    pub fn name(self) -> &'static str {
        match self {
            LightSamplingMode::Power => "Power",
            LightSamplingMode::Area => "Area",
        }
    }
}

/// Assignment of generate-pass threads to lights.
///
/// The table is `width x HEIGHT` cells, one per dispatched thread; see
/// [`LightSample`] for the cell encoding and [`gpu::light_cell()`] for the
/// layout. Analytic lights occupy the leading blocks, emissive triangles
/// start at the first block after them.
#[derive(Clone, Debug, PartialEq)]
pub struct LightTable {
    width: u32,
    cells: Vec<i32>,
    analytic_photons: u32,
    analytic_inv_pdf: f32,
    active_triangles: Vec<u32>,
    triangle_photons: Vec<u32>,
    emissive_inv_pdf: Vec<f32>,
}

impl LightTable {
    pub const HEIGHT: u32 = gpu::INFO_TEXTURE_HEIGHT;

    const CELLS_PER_BLOCK: u32 = LIGHT_BLOCK_SIZE * LIGHT_BLOCK_SIZE;
    const BLOCKS_PER_COLUMN: u32 = Self::HEIGHT / LIGHT_BLOCK_SIZE;

    /// Distributes (approximately) `requested` photons between lights.
    ///
    /// The realized photon count may be larger than requested, since every
    /// analytic light gets the same number of photons and every active
    /// emissive triangle gets at least one; see [`Self::realized()`].
    pub fn build(
        requested: u32,
        lights: &SceneLights,
        settings: LightSettings,
        mode: LightSamplingMode,
    ) -> Self {
        let analytic_lights = if settings.analytic_lights {
            lights.analytic.len() as u32
        } else {
            0
        };

        let emissive_meshes = if settings.emissive_lights {
            lights.emissive_meshes
        } else {
            0
        };

        let (analytic_photons, mut emissive_photons) = if analytic_lights > 0 {
            let share = (analytic_lights as f64)
                / ((analytic_lights + emissive_meshes) as f64);

            let photons = ((requested as f64) * share) as u32;
            let photons = photons.div_ceil(analytic_lights) * analytic_lights;

            (photons, requested.saturating_sub(photons))
        } else {
            (0, requested)
        };

        let mut active_triangles = Vec::new();
        let mut triangle_photons = Vec::new();

        if emissive_photons > 0 && settings.emissive_lights {
            active_triangles = lights
                .emissive_triangles
                .iter()
                .enumerate()
                .filter(|(_, tri)| tri.flux > 0.0)
                .map(|(idx, _)| idx as u32)
                .collect();

            let weights: Vec<f64> = active_triangles
                .iter()
                .map(|&idx| {
                    let tri = &lights.emissive_triangles[idx as usize];

                    match mode {
                        LightSamplingMode::Power => tri.flux as f64,
                        LightSamplingMode::Area => tri.area as f64,
                    }
                    .max(0.0)
                })
                .collect();

            let total_weight: f64 = weights.iter().sum();

            triangle_photons = if total_weight > 0.0 {
                let photons_per_weight = (emissive_photons as f64) / total_weight;

                weights
                    .iter()
                    .map(|weight| {
                        ((weight * photons_per_weight).ceil() as u32).max(1)
                    })
                    .collect()
            } else {
                let photons = emissive_photons
                    .div_ceil(active_triangles.len().max(1) as u32)
                    .max(1);

                vec![photons; active_triangles.len()]
            };
        }

        emissive_photons = triangle_photons.iter().sum();

        let realized = analytic_photons + emissive_photons;

        if realized == 0 {
            warn!("No photons to emit; the scene has no active lights");
        }

        let analytic_inv_pdf = if analytic_photons > 0 {
            ((analytic_photons as f64)
                / ((analytic_lights as f64) * (realized as f64))) as f32
        } else {
            0.0
        };

        let emissive_inv_pdf = triangle_photons
            .iter()
            .map(|&photons| {
                ((photons as f64) * (realized as f64)
                    / (emissive_photons as f64)) as f32
            })
            .collect();

        let analytic_blocks = analytic_photons.div_ceil(Self::CELLS_PER_BLOCK);
        let emissive_blocks = emissive_photons.div_ceil(Self::CELLS_PER_BLOCK);

        let width = (analytic_blocks + emissive_blocks)
            .div_ceil(Self::BLOCKS_PER_COLUMN)
            * LIGHT_BLOCK_SIZE;

        let mut this = Self {
            width,
            cells: vec![0; (width * Self::HEIGHT) as usize],
            analytic_photons,
            analytic_inv_pdf,
            active_triangles,
            triangle_photons,
            emissive_inv_pdf,
        };

        if analytic_photons > 0 {
            let photons_per_light = analytic_photons / analytic_lights;

            for idx in 0..analytic_photons {
                let light = idx / photons_per_light;

                this.set(idx, LightSample::Analytic(light));
            }
        }

        let mut idx = analytic_blocks * Self::CELLS_PER_BLOCK;

        for tri in 0..this.triangle_photons.len() {
            for _ in 0..this.triangle_photons[tri] {
                this.set(idx, LightSample::Emissive(tri as u32));
                idx += 1;
            }
        }

        this
    }

    fn set(&mut self, idx: u32, sample: LightSample) {
        let pos = gpu::light_cell(idx, self.width);

        self.cells[(pos.x + pos.y * self.width) as usize] = sample.encode();
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Size of the generate-pass dispatch: one thread per cell.
    pub fn dispatch_size(&self) -> UVec2 {
        uvec2(self.width, Self::HEIGHT)
    }

    pub fn get(&self, pos: UVec2) -> LightSample {
        LightSample::decode(self.cells[(pos.x + pos.y * self.width) as usize])
    }

    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    /// Total number of photons emitted per iteration, i.e. the number of used
    /// cells.
    pub fn realized(&self) -> u32 {
        self.analytic_photons + self.triangle_photons.iter().sum::<u32>()
    }

    pub fn is_empty(&self) -> bool {
        self.realized() == 0
    }

    pub fn analytic_photons(&self) -> u32 {
        self.analytic_photons
    }

    pub fn analytic_inv_pdf(&self) -> f32 {
        self.analytic_inv_pdf
    }

    /// Scene indices of emissive triangles with non-zero flux; emissive cells
    /// refer to positions within this list.
    pub fn active_triangles(&self) -> &[u32] {
        &self.active_triangles
    }

    pub fn triangle_photons(&self) -> &[u32] {
        &self.triangle_photons
    }

    pub fn emissive_inv_pdf(&self) -> &[f32] {
        &self.emissive_inv_pdf
    }
}

/// GPU-side copy of a [`LightTable`].
#[derive(Debug)]
pub struct LightTableBuffers {
    pub cells: Texture,
    pub active_triangles: StorageBuffer<Vec<u32>>,
    pub emissive_inv_pdf: StorageBuffer<Vec<f32>>,
}

impl LightTableBuffers {
    /// Uploads given table; returns `None` for a table without any cells.
    pub fn new(device: &mut dyn RenderDevice, table: &LightTable) -> Option<Self> {
        if table.width() == 0 {
            return None;
        }

        info!(
            "Uploading light table; size={:?}, photons={}",
            table.dispatch_size(),
            table.realized(),
        );

        let cells = Texture::builder("photon_light_table")
            .with_size(table.dispatch_size())
            .with_format(wgpu::TextureFormat::R32Sint)
            .build_with_contents(device, bytemuck::cast_slice(table.cells()));

        // Bound buffers can't be empty
        let mut active_triangles = table.active_triangles().to_vec();
        let mut emissive_inv_pdf = table.emissive_inv_pdf().to_vec();

        if active_triangles.is_empty() {
            active_triangles.push(0);
            emissive_inv_pdf.push(0.0);
        }

        Some(Self {
            cells,
            active_triangles: StorageBuffer::new_with_contents(
                device,
                "photon_light_table_triangles",
                &active_triangles,
            ),
            emissive_inv_pdf: StorageBuffer::new_with_contents(
                device,
                "photon_light_table_inv_pdf",
                &emissive_inv_pdf,
            ),
        })
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        self.cells.destroy(device);
        self.active_triangles.destroy(device);
        self.emissive_inv_pdf.destroy(device);
    }
}
