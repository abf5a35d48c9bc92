pub mod memory;
pub mod registry;
pub mod traits;

pub use memory::*;
pub use registry::*;
pub use traits::*;
