pub mod command_stream;
pub mod error;

pub use error::{Result, VmError};
