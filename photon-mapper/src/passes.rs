mod collect;
mod culling;
mod generate;

use log::debug;

pub use self::collect::*;
pub use self::culling::*;
pub use self::generate::*;
use crate::{RenderDevice, Result};

#[derive(Debug)]
pub struct PhotonPasses {
    pub generate: GeneratePass,
    pub culling: CullingPass,
    pub collect: CollectPass,
}

impl PhotonPasses {
    /// Compiles all programs; if any of them fails, the ones compiled so far
    /// are released before the error is returned.
    pub fn new(
        device: &mut dyn RenderDevice,
        collect: CollectStrategy,
    ) -> Result<Self> {
        debug!("Initializing photon passes");

        let generate = GeneratePass::new(device)?;

        let culling = match CullingPass::new(device) {
            Ok(pass) => pass,
            Err(err) => {
                generate.destroy(device);
                return Err(err);
            }
        };

        let collect = match CollectPass::new(device, collect) {
            Ok(pass) => pass,
            Err(err) => {
                generate.destroy(device);
                culling.destroy(device);
                return Err(err);
            }
        };

        Ok(Self {
            generate,
            culling,
            collect,
        })
    }

    pub fn destroy(self, device: &mut dyn RenderDevice) {
        self.generate.destroy(device);
        self.culling.destroy(device);
        self.collect.destroy(device);
    }
}
