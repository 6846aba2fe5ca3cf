use std::{str::FromStr, time::Duration};

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::{bail, eyre, Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::ingest::policy::NormalizePolicy;

const CATALOG_FILE_NAME: &str = "catalog.json";
const MEDIA_DIR_NAME: &str = "media";

const DEFAULT_ALLOWED_UPLOAD_TYPES: &[&str] = &[
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "video/x-matroska",
    "video/x-msvideo",
    "video/mpeg",
    "video/3gpp",
    "video/x-m4v",
];

const DEFAULT_ALLOWED_URL_PATTERNS: &[&str] = &[
    r"^https?://(www\.|m\.)?youtube\.com/shorts/[A-Za-z0-9_-]{5,}([?#].*)?$",
    r"^https?://(www\.|vm\.|vt\.)?tiktok\.com/[^\s]+$",
    r"^https?://(www\.)?instagram\.com/reels?/[A-Za-z0-9_-]+/?([?#].*)?$",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlDataDir {
    path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlBinPaths {
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub yt_dlp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
struct TomlIngest {
    pub normalize: Option<String>,
    pub max_concurrent: Option<usize>,
    pub max_upload_size: Option<String>,
    pub probe_timeout_secs: Option<u64>,
    pub transcode_timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,
    pub generated_titles: Option<bool>,
    pub public_url_prefix: Option<String>,
    pub allowed_upload_types: Option<Vec<String>>,
    pub allowed_url_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlConfig {
    pub address: Option<String>,
    pub port: Option<u16>,
    #[serde(rename = "DataDir")]
    pub data_dir: TomlDataDir,
    #[serde(rename = "BinPaths")]
    pub bin_paths: Option<TomlBinPaths>,
    #[serde(rename = "Ingest")]
    pub ingest: Option<TomlIngest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BinPaths {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub yt_dlp: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Public media root. Uploads, downloads and transcoder output all land here.
    pub media_dir: PathBuf,
    pub normalize: NormalizePolicy,
    /// Upper bound on ingestions running at the same time.
    pub max_concurrent: usize,
    pub max_upload_size: u64,
    pub probe_timeout: Duration,
    pub transcode_timeout: Duration,
    pub download_timeout: Duration,
    /// Fall back to "<Kind> clip <timestamp>" titles instead of file names.
    pub generated_titles: bool,
    pub public_url_prefix: String,
    pub allowed_upload_types: Vec<String>,
    pub allowed_url_patterns: Vec<Regex>,
}

impl IngestConfig {
    pub fn with_media_dir(media_dir: PathBuf) -> Self {
        Self {
            media_dir,
            normalize: NormalizePolicy::IfNeeded,
            max_concurrent: 4,
            max_upload_size: 512 * 1024 * 1024,
            probe_timeout: Duration::from_secs(30),
            transcode_timeout: Duration::from_secs(900),
            download_timeout: Duration::from_secs(300),
            generated_titles: true,
            public_url_prefix: "/files".to_string(),
            allowed_upload_types: DEFAULT_ALLOWED_UPLOAD_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_url_patterns: DEFAULT_ALLOWED_URL_PATTERNS
                .iter()
                .map(|p| Regex::new(p).expect("default url patterns are valid"))
                .collect(),
        }
    }

    pub fn relative_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_url_prefix.trim_end_matches('/'), file_name)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub data_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub bin_paths: BinPaths,
    pub ingest: IngestConfig,
}

pub async fn read_config(path: &Path) -> Result<Config> {
    let toml_str = tokio::fs::read_to_string(path)
        .await
        .context(format!("Error reading config file {}", path))?;
    // all relative paths in the config file are relative to its directory
    let config_dir = path.parent().unwrap_or(Path::new("."));
    parse_config(&toml_str, config_dir)
}

pub fn parse_config(toml_str: &str, config_dir: &Path) -> Result<Config> {
    let toml_config: TomlConfig = toml::from_str(toml_str).context("Error parsing config file")?;
    let data_dir = absolute_from(config_dir, PathBuf::from_str(&toml_config.data_dir.path)?);
    let bin_paths = toml_config
        .bin_paths
        .map(|bin_paths| BinPaths {
            ffmpeg: bin_paths.ffmpeg.map(PathBuf::from),
            ffprobe: bin_paths.ffprobe.map(PathBuf::from),
            yt_dlp: bin_paths.yt_dlp.map(PathBuf::from),
        })
        .unwrap_or_default();
    let ingest = read_ingest_section(
        toml_config.ingest.unwrap_or_default(),
        data_dir.join(MEDIA_DIR_NAME),
    )?;
    Ok(Config {
        address: toml_config.address,
        port: toml_config.port,
        catalog_path: data_dir.join(CATALOG_FILE_NAME),
        data_dir,
        bin_paths,
        ingest,
    })
}

fn read_ingest_section(toml_ingest: TomlIngest, media_dir: PathBuf) -> Result<IngestConfig> {
    let mut ingest = IngestConfig::with_media_dir(media_dir);
    if let Some(normalize) = toml_ingest.normalize {
        ingest.normalize = normalize
            .parse()
            .map_err(|_| eyre!("invalid normalize policy '{}'", normalize))?;
    }
    if let Some(max_concurrent) = toml_ingest.max_concurrent {
        if max_concurrent == 0 {
            bail!("Ingest.max_concurrent must be at least 1");
        }
        ingest.max_concurrent = max_concurrent;
    }
    if let Some(max_upload_size) = toml_ingest.max_upload_size {
        ingest.max_upload_size = parse_size::parse_size(&max_upload_size)
            .wrap_err(format!("invalid max_upload_size '{}'", max_upload_size))?;
    }
    if let Some(secs) = toml_ingest.probe_timeout_secs {
        ingest.probe_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml_ingest.transcode_timeout_secs {
        ingest.transcode_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml_ingest.download_timeout_secs {
        ingest.download_timeout = Duration::from_secs(secs);
    }
    if let Some(generated_titles) = toml_ingest.generated_titles {
        ingest.generated_titles = generated_titles;
    }
    if let Some(prefix) = toml_ingest.public_url_prefix {
        let prefix = prefix.trim_end_matches('/');
        if !prefix.starts_with('/') || prefix.len() < 2 {
            bail!(
                "Ingest.public_url_prefix must be an absolute path below /, got '{}'",
                prefix
            );
        }
        ingest.public_url_prefix = prefix.to_string();
    }
    if let Some(types) = toml_ingest.allowed_upload_types {
        ingest.allowed_upload_types = types.into_iter().map(|t| t.to_ascii_lowercase()).collect();
    }
    if let Some(patterns) = toml_ingest.allowed_url_patterns {
        ingest.allowed_url_patterns = patterns
            .iter()
            .map(|p| Regex::new(p).wrap_err(format!("invalid url pattern '{}'", p)))
            .collect::<Result<_>>()?;
    }
    Ok(ingest)
}

fn absolute_from(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
