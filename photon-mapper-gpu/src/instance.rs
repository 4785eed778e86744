use bytemuck::{Pod, Zeroable};

use crate::PhotonKind;

/// Top-level acceleration structure instance descriptor, laid out the way the
/// device consumes it (64 bytes).
#[repr(C)]
#[derive(Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct PhotonInstance {
    /// Row-major 3x4 object-to-world transform.
    pub transform: [f32; 12],

    /// Instance id in the low 24 bits, visibility mask in the high 8 bits.
    pub id_and_mask: u32,

    /// Hit-group offset in the low 24 bits, flags in the high 8 bits.
    pub offset_and_flags: u32,

    /// Device address of the instanced bottom-level structure.
    pub blas_address: u64,
}

impl PhotonInstance {
    pub const SIZE: usize = 64;

    pub const IDENTITY: [f32; 12] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
    ];

    /// Instance wrapping given population's bottom-level structure: identity
    /// transform, id equal to the population index and the population's
    /// mask.
    pub fn new(kind: PhotonKind, blas_address: u64) -> Self {
        let id = kind.index() as u32;

        Self {
            transform: Self::IDENTITY,
            id_and_mask: (id & 0x00ff_ffff) | (kind.instance_mask() << 24),
            offset_and_flags: 0,
            blas_address,
        }
    }

    pub fn id(&self) -> u32 {
        self.id_and_mask & 0x00ff_ffff
    }

    pub fn mask(&self) -> u32 {
        self.id_and_mask >> 24
    }
}
