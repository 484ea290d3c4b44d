pub mod enums;
pub mod prescription;

pub use enums::*;
pub use prescription::*;
