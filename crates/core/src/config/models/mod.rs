pub mod app_config;
pub mod coordinator;
pub mod observability;
pub mod registry;
pub mod tasks;

// Re-export main types for easier imports
pub use app_config::AppConfig;
pub use coordinator::CoordinatorConfig;
pub use observability::ObservabilityConfig;
pub use registry::{RegistryBackend, RegistryConfig};
pub use tasks::TaskDefinitionConfig;
