//! Host information (read-only).
//!
//! This is "world-touching" (reads `/etc`, searches `PATH`) and belongs in the HAL.

use crate::HalResult;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsReleaseInfo {
    pub id: Option<String>,
    pub id_like: Vec<String>,
    pub version_id: Option<String>,
}

impl OsReleaseInfo {
    /// True when `id` or any `ID_LIKE` entry matches one of `ids` (case-insensitive).
    pub fn matches_any(&self, ids: &[String]) -> bool {
        ids.iter().any(|wanted| {
            let wanted = wanted.to_ascii_lowercase();
            self.id.as_deref() == Some(wanted.as_str())
                || self.id_like.iter().any(|like| *like == wanted)
        })
    }
}

pub trait HostInfoOps {
    fn os_release(&self) -> HalResult<OsReleaseInfo>;

    /// Whether the current process runs with an effective uid of 0.
    fn is_root(&self) -> bool;

    /// Locate an executable on `PATH`.
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    fn path_exists(&self, path: &Path) -> HalResult<bool>;
}
