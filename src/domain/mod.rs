pub mod episode;
pub mod line;
pub mod node;

pub use episode::*;
pub use line::*;
pub use node::*;
