use castway_core::{CastwayError, Result};
use std::path::{Path, PathBuf};

/// Name of the external screen-mirroring server binary.
pub const SERVER_EXECUTABLE: &str = "remote-scrcpy";

/// Locate the external server executable.
///
/// An explicit path wins; otherwise the binary is resolved through `PATH`.
/// Failure here is fatal to the caller - no process is ever spawned.
pub fn resolve_server(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => {
            if path.is_file() {
                Ok(path.to_path_buf())
            } else {
                Err(CastwayError::ExecutableNotFound(
                    path.display().to_string(),
                ))
            }
        }
        None => resolve_on_path(SERVER_EXECUTABLE),
    }
}

fn resolve_on_path(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| CastwayError::ExecutableNotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_accepted() {
        let this_binary = std::env::current_exe().unwrap();
        let resolved = resolve_server(Some(&this_binary)).unwrap();
        assert_eq!(resolved, this_binary);
    }

    #[test]
    fn test_explicit_path_missing() {
        let result = resolve_server(Some(Path::new("/no/such/remote-scrcpy")));
        assert!(matches!(result, Err(CastwayError::ExecutableNotFound(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_path_lookup_finds_known_binary() {
        assert!(resolve_on_path("sh").is_ok());
    }

    #[test]
    fn test_path_lookup_misses_unknown_binary() {
        let result = resolve_on_path("castway-no-such-binary-here");
        assert!(matches!(result, Err(CastwayError::ExecutableNotFound(_))));
    }
}
