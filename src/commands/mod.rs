pub mod error;
pub mod executor;

pub use error::CommandError;
pub use executor::Executor;
