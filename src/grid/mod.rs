pub mod cost;
pub mod path;
pub mod topology;

pub use cost::*;
pub use path::*;
pub use topology::*;
