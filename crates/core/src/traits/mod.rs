pub mod discovery;
pub mod registry;
pub mod task_unit;

pub use discovery::*;
pub use registry::*;
pub use task_unit::*;
