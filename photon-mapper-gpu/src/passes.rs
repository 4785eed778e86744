use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct GeneratePassParams {
    pub seed: u32,
    pub max_bounces: u32,
    pub caustic_capacity: u32,
    pub global_capacity: u32,
    pub caustic_radius: f32,
    pub global_radius: f32,
    pub rejection_probability: f32,
    pub spec_rough_cutoff: f32,
    pub emissive_scale: f32,
    pub emissive_cutoff: f32,
    pub analytic_inv_pdf: f32,
    pub culling_bits: u32,
    pub dispatch_width: u32,
    pub flags: u32,
    pub _pad0: u32,
    pub _pad1: u32,
}

impl GeneratePassParams {
    pub const FLAG_ALPHA_TEST: u32 = 1 << 0;
    pub const FLAG_ADJUST_SHADING_NORMALS: u32 = 1 << 1;
    pub const FLAG_CULLING: u32 = 1 << 2;
    pub const FLAG_INFO_FLUX_16BIT: u32 = 1 << 3;
    pub const FLAG_ANALYTIC_LIGHTS: u32 = 1 << 4;
    pub const FLAG_EMISSIVE_LIGHTS: u32 = 1 << 5;
    pub const FLAG_ENV_LIGHT: u32 = 1 << 6;

    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct CollectPassParams {
    pub seed: u32,
    pub frame: u32,
    pub caustic_radius: f32,
    pub global_radius: f32,
    pub t_min: f32,
    pub t_max: f32,
    pub max_photons: u32,
    pub flags: u32,
}

impl CollectPassParams {
    pub const FLAG_COLLECT_CAUSTIC: u32 = 1 << 0;
    pub const FLAG_COLLECT_GLOBAL: u32 = 1 << 1;
    pub const FLAG_STOCHASTIC: u32 = 1 << 2;
    pub const FLAG_INFO_FLUX_16BIT: u32 = 1 << 3;

    pub fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Instance mask collect rays are traced with.
    pub fn instance_mask(&self) -> u32 {
        let mut mask = 0;

        if self.has(Self::FLAG_COLLECT_CAUSTIC) {
            mask |= crate::PhotonKind::Caustic.instance_mask();
        }

        if self.has(Self::FLAG_COLLECT_GLOBAL) {
            mask |= crate::PhotonKind::Global.instance_mask();
        }

        mask
    }
}

#[repr(C)]
#[derive(Clone, Copy, Default, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct CullingPassParams {
    pub culling_bits: u32,
    pub global_radius: f32,
    pub _pad0: u32,
    pub _pad1: u32,
}
