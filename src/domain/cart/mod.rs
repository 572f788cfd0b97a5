pub mod aggregate;
pub mod command_handler;

pub use aggregate::*;
pub use command_handler::*;
