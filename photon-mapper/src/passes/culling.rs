use glam::{uvec3, UVec2};
use log::info;

use crate::gpu::{CullingHash, CullingPassParams};
use crate::{
    Barrier, Pass, Program, ProgramDesc, RenderDevice, Resource, Result,
    Texture, TextureId,
};

/// Hash of the cells visible from the camera, filled by [`CullingPass`].
#[derive(Debug)]
pub struct CullingTexture {
    hash: CullingHash,
    texture: Texture,
}

impl CullingTexture {
    pub fn new(device: &mut dyn RenderDevice, hash: CullingHash) -> Self {
        info!("Allocating photon culling hash; bits={}", hash.bits());

        let texture = Texture::builder("photon_culling_hash")
            .with_size(hash.texture_size())
            .with_format(wgpu::TextureFormat::R32Uint)
            .build(device);

        Self { hash, texture }
    }

    pub fn hash(&self) -> CullingHash {
        self.hash
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        self.texture.destroy(device);
    }
}

/// Marks hash cells around every visible G-buffer pixel, so that the
/// generate pass can drop photons nobody could collect.
#[derive(Debug)]
pub struct CullingPass {
    program: Program,
    pass: Option<Pass<CullingPassParams>>,
}

impl CullingPass {
    pub fn new(device: &mut dyn RenderDevice) -> Result<Self> {
        let program = Program::new(
            device,
            ProgramDesc::compute("photon_culling", "photon_culling.cs"),
        )?;

        Ok(Self {
            program,
            pass: None,
        })
    }

    pub fn run(
        &mut self,
        device: &mut dyn RenderDevice,
        pos_w: TextureId,
        target: &CullingTexture,
        size: UVec2,
        global_radius: f32,
    ) {
        target.texture.clear(device);

        if size.x == 0 || size.y == 0 {
            return;
        }

        let pass = Pass::builder("photon_culling")
            .bind([
                ("gPosW", &pos_w),
                ("gCullingHash", &target.texture.bind_writable()),
            ])
            .build_cached(&mut self.pass, &self.program);

        // This pass uses 16x16 warps:
        let size = (size + 15) / 16;

        pass.run(
            device,
            uvec3(size.x, size.y, 1),
            CullingPassParams {
                culling_bits: target.hash.bits(),
                global_radius,
                ..Default::default()
            },
        );

        device.barrier(Barrier::Uav(Resource::Texture(target.texture.id())));
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        self.program.destroy(device);
    }
}
