//! Local chart icons
//!
//! Icons are downloaded once per package into `assets/icons/<name><ext>` so
//! that air-gapped installs can show them. Charts and the index refer to
//! them as `file://assets/icons/<name><ext>`.

use async_trait::async_trait;
use std::path::PathBuf;

use chartkeeper_core::Paths;

use crate::error::{RepoError, Result};
use crate::http::{Fetched, HttpClient};

/// Extensions looked up for an already downloaded icon, in order
pub const ICON_EXTENSIONS: [&str; 6] = [".png", ".jpg", ".jpeg", ".svg", ".ico", ".gif"];

/// Scheme prefix of local icon references
pub const LOCAL_ICON_SCHEME: &str = "file://";

/// Image formats an icon can be stored as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconFormat {
    Png,
    Jpeg,
    Gif,
    Svg,
    Ico,
}

impl IconFormat {
    pub fn extension(self) -> &'static str {
        match self {
            IconFormat::Png => ".png",
            IconFormat::Jpeg => ".jpg",
            IconFormat::Gif => ".gif",
            IconFormat::Svg => ".svg",
            IconFormat::Ico => ".ico",
        }
    }

    fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(IconFormat::Png),
            "jpg" | "jpeg" => Some(IconFormat::Jpeg),
            "gif" => Some(IconFormat::Gif),
            "svg" => Some(IconFormat::Svg),
            "ico" => Some(IconFormat::Ico),
            _ => None,
        }
    }

    /// Format named by the last path segment of a URL
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url::Url::parse(url).ok()?.path().to_string();
        let file = path.rsplit('/').next()?;
        let (_, extension) = file.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match mime.as_str() {
            "image/png" => Some(IconFormat::Png),
            "image/jpeg" | "image/jpg" => Some(IconFormat::Jpeg),
            "image/gif" => Some(IconFormat::Gif),
            "image/svg+xml" => Some(IconFormat::Svg),
            "image/x-icon" | "image/vnd.microsoft.icon" => Some(IconFormat::Ico),
            _ => None,
        }
    }

    /// Guess the format from the leading bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(IconFormat::Jpeg);
        }
        if data.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(IconFormat::Png);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(IconFormat::Gif);
        }

        let head = &data[..data.len().min(512)];
        let text = String::from_utf8_lossy(head);
        let text = text.trim_start_matches('\u{feff}').trim_start();
        if text.starts_with("<svg") || (text.starts_with("<?xml") && text.contains("<svg")) {
            return Some(IconFormat::Svg);
        }
        None
    }

    /// URL path suffix first, then the `Content-Type` header, then the bytes
    pub fn detect(url: &str, fetched: &Fetched) -> Option<Self> {
        Self::from_url(url)
            .or_else(|| fetched.content_type.as_deref().and_then(Self::from_content_type))
            .or_else(|| Self::sniff(&fetched.data))
    }
}

/// Downloads icons
#[async_trait]
pub trait IconFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched>;
}

#[async_trait]
impl IconFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Fetched> {
        self.get(url).await
    }
}

/// The `assets/icons` directory of a repository
#[derive(Debug, Clone)]
pub struct IconStore {
    paths: Paths,
}

impl IconStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    fn icon_file(&self, name: &str, extension: &str) -> PathBuf {
        self.paths.icons.join(format!("{}{}", name, extension))
    }

    fn reference(&self, file: &std::path::Path) -> String {
        let relative = self
            .paths
            .relative(file)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}{}", LOCAL_ICON_SCHEME, relative)
    }

    /// Reference to the icon already downloaded for `name`
    pub fn local_icon_path(&self, name: &str) -> Result<String> {
        ICON_EXTENSIONS
            .iter()
            .map(|extension| self.icon_file(name, extension))
            .find(|file| file.is_file())
            .map(|file| self.reference(&file))
            .ok_or_else(|| RepoError::Icon {
                package: name.to_string(),
                message: "no icon found".to_string(),
            })
    }

    /// Store an icon and return its reference
    pub fn persist(&self, name: &str, format: IconFormat, data: &[u8]) -> Result<String> {
        std::fs::create_dir_all(&self.paths.icons)?;
        let file = self.icon_file(name, format.extension());
        std::fs::write(&file, data)?;
        tracing::info!("Downloaded icon and saved at: {}", self.paths.relative(&file).display());
        Ok(self.reference(&file))
    }

    /// Reference to the icon of `name`, downloading it from `icon_url` if needed
    pub async fn ensure_icon(
        &self,
        fetcher: &dyn IconFetcher,
        name: &str,
        icon_url: Option<&str>,
    ) -> Result<String> {
        if let Ok(reference) = self.local_icon_path(name) {
            return Ok(reference);
        }

        let url = icon_url.filter(|u| !u.is_empty()).ok_or_else(|| RepoError::Icon {
            package: name.to_string(),
            message: "chart has no icon URL and no local icon exists".to_string(),
        })?;
        let fetched = fetcher.fetch(url).await?;
        let format = IconFormat::detect(url, &fetched).ok_or_else(|| RepoError::Icon {
            package: name.to_string(),
            message: format!("failed to determine the file type of {}", url),
        })?;

        self.persist(name, format, &fetched.data)
    }
}

/// Path of a local icon reference relative to the repository root
pub fn strip_local_scheme(reference: &str) -> Option<&str> {
    reference.strip_prefix(LOCAL_ICON_SCHEME)
}
