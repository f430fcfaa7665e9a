mod error;
mod hex;
mod input;
mod logging;

pub use error::*;
pub use hex::*;
pub use input::*;
pub use logging::*;
