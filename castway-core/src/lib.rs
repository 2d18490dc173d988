pub mod config;
pub mod error;
pub mod urls;

pub use config::{parse_port, LaunchConfig, Manifest, RestartPolicy, ShutdownPolicy};
pub use error::{CastwayError, Result};
pub use urls::{Player, ServerUrls};
