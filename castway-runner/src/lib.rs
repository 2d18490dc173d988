pub mod resolver;
pub mod supervisor;

pub use resolver::{resolve_server, SERVER_EXECUTABLE};
pub use supervisor::{ExitSummary, Supervisor};
