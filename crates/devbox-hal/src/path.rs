use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Search a `PATH`-style string for an executable file.
pub fn find_executable_in_path(binary: &str, path_env: &str) -> Option<PathBuf> {
    if binary.contains('/') {
        let candidate = PathBuf::from(binary);
        return is_executable(&candidate).then_some(candidate);
    }
    for dir in path_env.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(binary);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
