use glam::UVec2;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{RenderDevice, Texture};

/// Provides per-pixel seeds the kernels initialize their random number
/// generators with, plus a fresh seed for every dispatch.
#[derive(Debug)]
pub struct SeedProvider {
    rng: StdRng,
    table: Option<Texture>,
}

impl SeedProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            table: None,
        }
    }

    /// Creates a provider seeded from the operating system's entropy source.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            table: None,
        }
    }

    /// Returns the seed table for given screen size, (re)generating it when
    /// the size changed.
    pub fn table(
        &mut self,
        device: &mut dyn RenderDevice,
        size: UVec2,
    ) -> &Texture {
        let table = match self.table.take() {
            Some(table) if table.size() == size => table,

            stale => {
                if let Some(stale) = stale {
                    stale.destroy(device);
                }

                info!("Generating seed table; size={size:?}");

                let seeds: Vec<u32> =
                    (0..size.x * size.y).map(|_| self.rng.gen()).collect();

                Texture::builder("photon_seeds")
                    .with_size(size)
                    .with_format(wgpu::TextureFormat::R32Uint)
                    .build_with_contents(device, bytemuck::cast_slice(&seeds))
            }
        };

        self.table.insert(table)
    }

    pub fn next_seed(&mut self) -> u32 {
        self.rng.gen()
    }

    pub fn release(&mut self, device: &mut dyn RenderDevice) {
        if let Some(table) = self.table.take() {
            table.destroy(device);
        }
    }
}
