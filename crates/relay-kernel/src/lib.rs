//! Kernel Builder (C9, spec §4.9 step 3).

pub mod builder;
pub mod error;

pub use builder::{Kernel, KernelBuilder};
pub use error::{KernelError, KernelResult};
