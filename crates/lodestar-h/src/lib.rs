pub mod cdp;
pub mod driver;
pub mod query;

pub use driver::HeadlessDriver;
