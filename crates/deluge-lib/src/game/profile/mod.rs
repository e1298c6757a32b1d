pub mod store;
pub mod types;

pub use store::ProfileEntry;
pub use types::*;
