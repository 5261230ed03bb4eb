pub mod ai;
pub mod config;
pub mod driver;
pub mod execution;
pub mod history;
pub mod page_state;
pub mod probe;
pub mod resolution;

pub use ai::{AiBackend, AiError, HttpAiBackend, SuggestionAdapter};
pub use driver::{Driver, DriverError};
pub use history::HealingHistory;
pub use page_state::{PageStateError, validate_page_state};
pub use probe::probe;
pub use resolution::{Resolution, ResolutionSource, ResolveError, ResolveOptions, Resolver};
