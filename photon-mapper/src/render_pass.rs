use glam::UVec2;

use crate::{FrameContext, RenderDevice, Result, Scene};

/// Texture a render pass reads or writes, as declared to the render graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    pub name: &'static str,

    /// Name the texture is bound under in the pass' programs.
    pub texname: &'static str,

    pub desc: &'static str,
    pub optional: bool,
    pub format: Option<wgpu::TextureFormat>,

    /// `None` stands for the render graph's default size.
    pub size: Option<UVec2>,
}

impl Channel {
    pub fn new(
        name: &'static str,
        texname: &'static str,
        desc: &'static str,
    ) -> Self {
        Self {
            name,
            texname,
            desc,
            optional: false,
            format: None,
            size: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_size(mut self, size: Option<UVec2>) -> Self {
        self.size = size;
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reflection {
    pub inputs: Vec<Channel>,
    pub outputs: Vec<Channel>,
}

/// Render pass, as driven by the host's render graph.
pub trait RenderPass {
    fn reflect(&self) -> Reflection;

    /// Records the pass' work for a single frame.
    fn execute(
        &mut self,
        device: &mut dyn RenderDevice,
        ctx: &mut FrameContext,
    ) -> Result<()>;

    /// Called when the scene gets (re)loaded; `None` unloads it.
    fn set_scene(
        &mut self,
        device: &mut dyn RenderDevice,
        scene: Option<&dyn Scene>,
    ) -> Result<()>;

    fn render_ui(&mut self, ui: &mut egui::Ui);

    /// Serializes the pass' configuration for scripting.
    fn scripting_dictionary(&self) -> Result<serde_json::Value>;
}
