//! SWIM-style failure detection over UDP
pub mod cli;
pub mod error;
pub mod settings;
pub mod swim;
pub mod transport;

pub use error::{Result, SwimError};
pub use swim::{Detector, DetectorHandle};
