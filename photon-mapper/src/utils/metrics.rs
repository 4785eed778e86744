#[cfg(feature = "metrics")]
use std::time::Instant;

/// CPU-side timing of a single stage, reported when [`Self::end()`] is
/// called; compiles down to nothing without the `metrics` feature.
#[derive(Debug)]
pub struct Metric {
    #[cfg(feature = "metrics")]
    label: &'static str,

    #[cfg(feature = "metrics")]
    started_at: Instant,
}

impl Metric {
    #[allow(unused_variables)]
    pub fn new(label: &'static str) -> Self {
        Self {
            #[cfg(feature = "metrics")]
            label,

            #[cfg(feature = "metrics")]
            started_at: Instant::now(),
        }
    }

    pub fn end(self) {
        #[cfg(feature = "metrics")]
        log::trace!(
            "metric `{}`: {}",
            self.label,
            humantime::format_duration(self.started_at.elapsed())
        );
    }
}

/// Evaluates given expression, measuring how long it took.
macro_rules! measure {
    ($label:literal, $expr:expr) => {{
        let metric = $crate::utils::Metric::new($label);
        let result = $expr;

        metric.end();
        result
    }};
}

pub(crate) use measure;
