pub mod loader;
pub mod schema;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{
    AiConfig, AiProvider, ExecutionConfig, HistoryConfig, LodestarConfig, ResolverConfig,
};
