mod decoder;
mod fields;

pub use decoder::*;
pub use fields::*;
