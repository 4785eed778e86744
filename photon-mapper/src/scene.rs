/// Analytic (point, spot, directional, area) light as seen by photon
/// emission.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnalyticLight {
    pub power: f32,
}

/// Emissive triangle of a mesh light.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EmissiveTriangle {
    pub flux: f32,
    pub area: f32,
}

/// Lights photons get emitted from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneLights {
    pub analytic: Vec<AnalyticLight>,

    /// Number of emissive meshes; approximates the number of emissive lights
    /// when splitting photons between analytic and emissive geometry.
    pub emissive_meshes: u32,

    pub emissive_triangles: Vec<EmissiveTriangle>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SceneUpdates {
    pub camera_moved: bool,
    pub geometry_changed: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightSettings {
    pub analytic_lights: bool,
    pub emissive_lights: bool,
    pub env_light: bool,
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            analytic_lights: true,
            emissive_lights: true,
            env_light: false,
        }
    }
}

/// Host scene, as queried by the photon mapper.
pub trait Scene {
    fn lights(&self) -> SceneLights;

    /// Changes whenever [`Self::lights()`] would return something different;
    /// lights are queried only after this value changes.
    fn lights_generation(&self) -> u64;

    /// Changes since the previous frame.
    fn updates(&self) -> SceneUpdates;

    /// Whether the scene contains non-triangle geometry, which photons ignore.
    fn has_custom_geometry(&self) -> bool;

    fn light_settings(&self) -> LightSettings;
}
