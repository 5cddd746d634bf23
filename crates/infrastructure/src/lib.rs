pub mod memory_registry;
pub mod redis_registry;
pub mod registry_factory;

pub use memory_registry::InMemoryRegistry;
pub use redis_registry::{RedisRegistry, RegistryKeys};
pub use registry_factory::RegistryFactory;
