use glam::{ivec3, uvec2, IVec3, UVec2, Vec3};
#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

/// Spatial hash of camera-visible cells.
///
/// The culling pass marks, for every visible G-buffer pixel, all cells a
/// gather sphere around that pixel can touch; the generate pass then drops
/// photons landing in unmarked cells, since no pixel could ever collect them.
///
/// Cells are `2 * radius` wide, so a sphere of `radius` overlaps at most two
/// cells per axis - see [`Self::overlapping_cells()`].
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub struct CullingHash {
    bits: u32,
}

impl CullingHash {
    /// Height of the texture backing the hash.
    pub const Y_EXTENT: u32 = 512;

    pub const MIN_BITS: u32 = 9;
    pub const MAX_BITS: u32 = 28;

    pub fn new(bits: u32) -> Self {
        Self {
            bits: bits.clamp(Self::MIN_BITS, Self::MAX_BITS),
        }
    }

    pub fn bits(self) -> u32 {
        self.bits
    }

    pub fn len(self) -> u32 {
        1 << self.bits
    }

    pub fn texture_size(self) -> UVec2 {
        uvec2(self.len() / Self::Y_EXTENT, Self::Y_EXTENT)
    }

    pub fn cell_size(radius: f32) -> f32 {
        2.0 * radius
    }

    pub fn cell(pos: Vec3, cell_size: f32) -> IVec3 {
        (pos / cell_size).floor().as_ivec3()
    }

    /// Returns the eight cells that a sphere of radius `cell_size / 2`
    /// centered at `pos` may overlap.
    pub fn overlapping_cells(pos: Vec3, cell_size: f32) -> [IVec3; 8] {
        let scaled = pos / cell_size;
        let cell = scaled.floor();
        let frac = scaled - cell;
        let cell = cell.as_ivec3();

        let step = ivec3(
            if frac.x < 0.5 { -1 } else { 1 },
            if frac.y < 0.5 { -1 } else { 1 },
            if frac.z < 0.5 { -1 } else { 1 },
        );

        let mut cells = [cell; 8];
        let mut idx = 0;

        while idx < 8 {
            cells[idx] = cell
                + ivec3(
                    if idx & 1 > 0 { step.x } else { 0 },
                    if idx & 2 > 0 { step.y } else { 0 },
                    if idx & 4 > 0 { step.z } else { 0 },
                );

            idx += 1;
        }

        cells
    }

    pub fn index(self, cell: IVec3) -> u32 {
        let hash = (cell.x as u32).wrapping_mul(73856093)
            ^ (cell.y as u32).wrapping_mul(19349663)
            ^ (cell.z as u32).wrapping_mul(83492791);

        hash & (self.len() - 1)
    }

    pub fn texel(self, index: u32) -> UVec2 {
        uvec2(index / Self::Y_EXTENT, index % Self::Y_EXTENT)
    }
}
