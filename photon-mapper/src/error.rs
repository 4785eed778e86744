use thiserror::Error;

/// Failures that abort the photon mapper's execution.
///
/// Recoverable conditions (full photon buffers, zero photons, zero lights)
/// never surface here; they only degrade the current iteration's output.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "acceleration structure build failed: raytracing is not supported by \
         the current device"
    )]
    RaytracingUnsupported,

    #[error(
        "execute failed: scene geometry changed, but the photon mapper \
         supports only a static geometry set per scene"
    )]
    GeometryChanged,

    #[error("shader compilation failed for `{stage}`: {message}")]
    ProgramCompilation { stage: String, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid scripting dictionary: {0}")]
    Dictionary(#[from] serde_json::Error),
}

impl Error {
    /// Names the stage that failed, for diagnostics.
    pub fn stage(&self) -> &str {
        match self {
            Error::RaytracingUnsupported => "acceleration structure build",
            Error::GeometryChanged => "execute",
            Error::ProgramCompilation { stage, .. } => stage,
            Error::InvalidConfig(_) | Error::Dictionary(_) => "configuration",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
