pub mod assignment;
pub mod config;
pub mod election;
pub mod errors;
pub mod models;
pub mod registration;
pub mod traits;
pub mod utils;

pub use assignment::assign_capacity;
pub use config::{
    AppConfig, CoordinatorConfig, ObservabilityConfig, RegistryBackend, RegistryConfig,
    TaskDefinitionConfig,
};
pub use election::{elect_leader, is_leader};
pub use errors::*;
pub use models::*;
pub use registration::{plan_registration, RegistrationPlan};
pub use traits::{
    ProcessorContext, RegistryClient, TaskDiscovery, TaskProcessor, TaskUnit, TaskUnitFactory,
};
