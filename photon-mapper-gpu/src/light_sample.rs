use glam::{uvec2, UVec2};

/// Edge of the square blocks the light-sample table is tiled with; matches
/// the generate pass' workgroup so that a workgroup samples as few distinct
/// lights as possible.
pub const LIGHT_BLOCK_SIZE: u32 = 16;

/// Returns position of the `index`-th cell of the light-sample table of given
/// width.
///
/// Cells are filled block by block; blocks are laid out in raster order and
/// cells within a block are in raster order as well.
pub fn light_cell(index: u32, width: u32) -> UVec2 {
    let block = index / (LIGHT_BLOCK_SIZE * LIGHT_BLOCK_SIZE);
    let within = index % (LIGHT_BLOCK_SIZE * LIGHT_BLOCK_SIZE);
    let block_x = block * LIGHT_BLOCK_SIZE;

    uvec2(
        block_x % width + within % LIGHT_BLOCK_SIZE,
        (block_x / width) * LIGHT_BLOCK_SIZE + within / LIGHT_BLOCK_SIZE,
    )
}

/// Light a generate-pass thread emits its photon from, decoded from a cell
/// of the light-sample table.
///
/// Cells are stored as `i32`: zero marks an unused cell, negative values are
/// analytic lights and positive ones are active emissive triangles, both
/// offset by one so that zero stays reserved.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(target_arch = "spirv"), derive(Debug))]
pub enum LightSample {
    Unused,
    Analytic(u32),
    Emissive(u32),
}

impl LightSample {
    pub fn decode(cell: i32) -> Self {
        if cell < 0 {
            LightSample::Analytic((-cell - 1) as u32)
        } else if cell > 0 {
            LightSample::Emissive((cell - 1) as u32)
        } else {
            LightSample::Unused
        }
    }

    pub fn encode(self) -> i32 {
        match self {
            LightSample::Unused => 0,
            LightSample::Analytic(id) => -(id as i32) - 1,
            LightSample::Emissive(id) => id as i32 + 1,
        }
    }

    pub fn is_used(self) -> bool {
        !matches!(self, LightSample::Unused)
    }
}
