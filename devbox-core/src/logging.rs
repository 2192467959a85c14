use std::path::PathBuf;

const DEFAULT_LOG_DIR: &str = "/var/log/devbox";
const DEFAULT_LOG_FILE: &str = "devbox.log";

/// Initialise `env_logger`.
///
/// Logs are appended to `log_file` (default `/var/log/devbox/devbox.log`) so a
/// provisioning run leaves a trail; if the file cannot be opened (not root,
/// read-only FS) logs go to stderr. `RUST_LOG` overrides the `info` default.
pub fn init_with(log_file: Option<PathBuf>) {
    use env_logger::Target;
    use std::fs;
    use std::io;

    let path = log_file.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR).join(DEFAULT_LOG_FILE));
    let target = (|| -> io::Result<Target> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Target::Pipe(Box::new(file)))
    })()
    .unwrap_or(Target::Stderr);

    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(target)
        .try_init();
}
