pub mod app;
pub mod shutdown;
pub mod telemetry;

pub use app::Application;
pub use shutdown::ShutdownManager;
