//! Parsing helpers for `/etc/os-release`.

use crate::hal::OsReleaseInfo;

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').trim_matches('\'').to_string()
}

/// Parses `os-release` content.
///
/// `id` and `id_like` are lowercased; `version_id` is kept verbatim (Ubuntu uses `22.04`).
pub fn parse_os_release(content: &str) -> OsReleaseInfo {
    let mut info = OsReleaseInfo::default();

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some(value) = line.strip_prefix("ID=") {
            info.id = Some(unquote(value).to_lowercase()).filter(|s| !s.is_empty());
        } else if let Some(value) = line.strip_prefix("ID_LIKE=") {
            info.id_like = unquote(value)
                .split_whitespace()
                .map(|s| s.to_lowercase())
                .collect();
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            info.version_id = Some(unquote(value)).filter(|s| !s.is_empty());
        }
    }

    info
}
