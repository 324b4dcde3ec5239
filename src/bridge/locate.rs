//! Resolution of the bridge executable

use std::path::{Path, PathBuf};

use log::debug;

#[cfg(windows)]
pub const TOOL_NAME: &str = "adb.exe";
#[cfg(not(windows))]
pub const TOOL_NAME: &str = "adb";

const PLATFORM_TOOLS_DIR: &str = "platform-tools";

/// Finds the bridge tool.
///
/// An explicit override wins. Otherwise the directory holding the running
/// program is searched, then its `platform-tools` subdirectory, and finally
/// the bare tool name is returned so the OS search path resolves it.
pub fn locate_tool(override_path: Option<&Path>) -> PathBuf {
    if let Some(path) = override_path {
        debug!("using configured bridge tool {}", path.display());
        return path.to_path_buf();
    }

    match program_dir() {
        Some(base) => locate_tool_in(&base),
        None => PathBuf::from(TOOL_NAME),
    }
}

/// Search order relative to `base`; see [`locate_tool`]
pub fn locate_tool_in(base: &Path) -> PathBuf {
    let candidates = [
        base.join(TOOL_NAME),
        base.join(PLATFORM_TOOLS_DIR).join(TOOL_NAME),
    ];

    for candidate in candidates {
        if candidate.is_file() {
            debug!("found bridge tool at {}", candidate.display());
            return candidate;
        }
    }

    debug!("bridge tool not bundled, relying on search path");
    PathBuf::from(TOOL_NAME)
}

/// Directory containing the running executable
pub fn program_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_prefers_tool_beside_program() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TOOL_NAME), b"").unwrap();
        fs::create_dir(dir.path().join(PLATFORM_TOOLS_DIR)).unwrap();
        fs::write(dir.path().join(PLATFORM_TOOLS_DIR).join(TOOL_NAME), b"").unwrap();

        assert_eq!(locate_tool_in(dir.path()), dir.path().join(TOOL_NAME));
    }

    #[test]
    fn test_falls_back_to_platform_tools() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(PLATFORM_TOOLS_DIR)).unwrap();
        fs::write(dir.path().join(PLATFORM_TOOLS_DIR).join(TOOL_NAME), b"").unwrap();

        assert_eq!(
            locate_tool_in(dir.path()),
            dir.path().join(PLATFORM_TOOLS_DIR).join(TOOL_NAME)
        );
    }

    #[test]
    fn test_falls_back_to_search_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(locate_tool_in(dir.path()), PathBuf::from(TOOL_NAME));
    }

    #[test]
    fn test_override_wins() {
        let custom = Path::new("/opt/android/adb");
        assert_eq!(locate_tool(Some(custom)), custom.to_path_buf());
    }
}
