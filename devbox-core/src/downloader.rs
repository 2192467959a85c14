use anyhow::{Context, Result};
use log::info;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub max_retries: usize,
    pub timeout_secs: u64,
    pub download_dir: PathBuf,
    /// First retry delay; doubles per attempt.
    pub backoff: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_secs: 300,
            download_dir: PathBuf::from("/var/cache/devbox"),
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadArtifact {
    pub path: PathBuf,
    pub size: u64,
    /// A verified copy was already on disk; nothing was fetched.
    pub reused: bool,
}

pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Last path segment of `url`, used when the catalogue gives no file name.
pub fn file_name_from_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url).with_context(|| format!("invalid url {}", url))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("cannot derive a file name from {}", url))
}

pub struct Downloader {
    client: Client,
    opts: DownloadOptions,
}

impl Downloader {
    pub fn new(opts: DownloadOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(opts.timeout_secs))
            .user_agent(concat!("devbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, opts })
    }

    pub fn options(&self) -> &DownloadOptions {
        &self.opts
    }

    /// Download `url` into the download directory and verify its SHA-256.
    ///
    /// A file that already matches `sha256` is reused. Data is written to a
    /// `.part` file and renamed only after the checksum matches.
    pub fn fetch(&self, url: &str, sha256: &str, file_name: Option<&str>) -> Result<DownloadArtifact> {
        let name = match file_name {
            Some(name) => name.to_string(),
            None => file_name_from_url(url)?,
        };
        let expected = sha256.to_ascii_lowercase();
        fs::create_dir_all(&self.opts.download_dir).with_context(|| {
            format!("Failed to create {}", self.opts.download_dir.display())
        })?;
        let target = self.opts.download_dir.join(&name);

        if target.exists() && sha256_file(&target)? == expected {
            info!("⬇️ {} already downloaded and verified", name);
            let size = target.metadata()?.len();
            return Ok(DownloadArtifact {
                path: target,
                size,
                reused: true,
            });
        }

        let partial = self.opts.download_dir.join(format!("{}.part", name));
        let attempts = self.opts.max_retries.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            info!("⬇️ Downloading {} (attempt {}/{})", url, attempt, attempts);
            match self.download_once(url, &partial, attempt) {
                Ok(size) => {
                    let computed = sha256_file(&partial)?;
                    if computed != expected {
                        let _ = fs::remove_file(&partial);
                        anyhow::bail!(
                            "checksum mismatch for {}: {} != {}",
                            name,
                            computed,
                            expected
                        );
                    }
                    fs::rename(&partial, &target).with_context(|| {
                        format!("Failed to move download into {}", target.display())
                    })?;
                    return Ok(DownloadArtifact {
                        path: target,
                        size,
                        reused: false,
                    });
                }
                Err(err) => {
                    log::warn!("Download attempt {} failed: {:#}", attempt, err);
                    last_err = Some(err);
                    if attempt < attempts {
                        sleep(self.opts.backoff * (1u32 << (attempt - 1).min(5)));
                    }
                }
            }
        }
        let _ = fs::remove_file(&partial);
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("download failed")))
            .with_context(|| format!("Failed to download {}", url))
    }

    fn download_once(&self, url: &str, dest: &Path, attempt: usize) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .header("X-Devbox-Attempt", attempt.to_string())
            .send()
            .with_context(|| format!("{} request failed", url))?;
        if !response.status().is_success() {
            anyhow::bail!("{} returned {}", url, response.status());
        }
        let mut file = File::create(dest)?;
        let size = io::copy(&mut response, &mut file)?;
        file.sync_all()?;
        Ok(size)
    }
}
