pub trait F32Ext
where
    Self: Sized,
{
    fn sqr(self) -> Self;
}

impl F32Ext for f32 {
    fn sqr(self) -> Self {
        self * self
    }
}

/// Rounds `value` up to the nearest multiple of `multiple`.
pub fn align_to(value: u64, multiple: u64) -> u64 {
    value.div_ceil(multiple) * multiple
}
