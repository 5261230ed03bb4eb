pub mod cache;
pub mod engine;
pub mod result;
pub mod strategy;

pub use cache::{ResolutionCache, normalize_key};
pub use engine::Resolver;
pub use result::{Resolution, ResolutionSource, ResolveError, ResolveOptions};
pub use strategy::{PipelineOutcome, Strategy, StrategyMatch, StrategyPipeline};
