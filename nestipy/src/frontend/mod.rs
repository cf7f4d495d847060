//! The optional frontend dev server: argument/env preparation and the
//! process supervisor that owns it.

mod args;
mod supervisor;

pub use args::*;
pub use supervisor::*;

use nestipy_core::Emission;

/// Destination for classified frontend output.
pub trait LogSink: Send + Sync {
    fn emit(&self, emission: &Emission);
}
