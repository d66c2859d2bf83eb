//! Re-export public algorithms.

pub mod communicator;
pub mod halo;
pub mod residual;
pub mod stencil;
pub mod wire;

pub use halo::{ExchangeMode, HaloExchanger};
pub use stencil::{Region, update};
