use std::marker::PhantomData;

use bytemuck::Pod;
use glam::UVec3;
use log::debug;

use crate::{
    Bindable, Binding, Dispatch, Error, ProgramDesc, ProgramId, ProgramKind,
    RenderDevice, Result,
};

/// Compiled program, together with the description it was compiled from.
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    desc: ProgramDesc,
}

impl Program {
    pub fn new(device: &mut dyn RenderDevice, desc: ProgramDesc) -> Result<Self> {
        debug!("Compiling program: {} ({})", desc.label, desc.source);

        let id = device.create_program(&desc).map_err(|message| {
            Error::ProgramCompilation {
                stage: desc.label.clone(),
                message,
            }
        })?;

        Ok(Self { id, desc })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn desc(&self) -> &ProgramDesc {
        &self.desc
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        device.destroy_program(self.id);
    }
}

/// Program with its resources bound, ready to be dispatched.
///
/// Bindings are resolved when the pass is built, so a pass has to be rebuilt
/// whenever any of the resources it binds gets reallocated.
#[derive(Debug)]
pub struct Pass<P> {
    label: String,
    program: ProgramId,
    raytracing: bool,
    bindings: Vec<Binding>,
    _params: PhantomData<P>,
}

impl<P> Pass<P>
where
    P: Pod,
{
    pub fn builder(label: impl ToString) -> PassBuilder<P> {
        PassBuilder {
            label: label.to_string(),
            bindings: Default::default(),
            _params: PhantomData,
        }
    }

    pub fn run(&self, device: &mut dyn RenderDevice, size: UVec3, params: P) {
        let dispatch = Dispatch {
            program: self.program,
            bindings: &self.bindings,
            params: bytemuck::bytes_of(&params),
            size,
        };

        if self.raytracing {
            device.dispatch_rays(&dispatch);
        } else {
            device.dispatch_compute(&dispatch);
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}

pub struct PassBuilder<P> {
    label: String,
    bindings: Vec<Binding>,
    _params: PhantomData<P>,
}

impl<P> PassBuilder<P>
where
    P: Pod,
{
    pub fn bind<const N: usize>(
        mut self,
        items: [(&'static str, &dyn Bindable); N],
    ) -> Self {
        for (name, item) in items {
            self.bindings.push(item.bind(name));
        }

        self
    }

    /// Returns `cached` if it already binds the same resources to the same
    /// program, otherwise builds a new pass in its place.
    pub fn build_cached<'a>(
        self,
        cached: &'a mut Option<Pass<P>>,
        program: &Program,
    ) -> &'a Pass<P> {
        let is_valid = cached.as_ref().is_some_and(|pass| {
            pass.program == program.id() && pass.bindings == self.bindings
        });

        if !is_valid {
            *cached = None;
        }

        cached.get_or_insert_with(|| self.build(program))
    }

    pub fn build(self, program: &Program) -> Pass<P> {
        debug!("Initializing pass: {}", self.label);

        Pass {
            label: self.label,
            program: program.id(),
            raytracing: matches!(
                program.desc().kind,
                ProgramKind::Raytracing { .. }
            ),
            bindings: self.bindings,
            _params: PhantomData,
        }
    }
}
