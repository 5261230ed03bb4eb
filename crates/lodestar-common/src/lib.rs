pub mod error;
pub mod healing;
pub mod locator;
pub mod protocol;
pub mod suggestion;

pub use error::DriverError;
pub use healing::{HealingRecord, HealingStatistics, HealingStrategy};
pub use locator::{Locator, LocatorKind};
pub use protocol::{ElementHandle, NavigationResult, ProbeResult, ProcessOutput, WaitPolicy};
pub use suggestion::{AiSuggestion, VisualVerdict};
