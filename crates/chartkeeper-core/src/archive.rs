//! Chart archive codec
//!
//! Reads and writes charts in the Helm `.tgz` layout, where every entry sits
//! under a single top-level directory named after the chart. Written archives
//! are reproducible: fixed mode, zero mtime, files in path order.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, Header};
use walkdir::WalkDir;

use crate::chart::{CHART_YAML, Chart, ChartFile, ChartMetadata};
use crate::error::{CoreError, Result};

impl Chart {
    /// Load a chart from a `.tgz` file
    pub fn load_archive(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::ChartNotFound {
                    path: path.display().to_string(),
                }
            } else {
                CoreError::Io(e)
            }
        })?;
        Self::read_archive(file)
    }

    /// Load a chart from `.tgz` bytes
    pub fn load_archive_bytes(data: &[u8]) -> Result<Self> {
        Self::read_archive(data)
    }

    fn read_archive<R: Read>(reader: R) -> Result<Self> {
        let mut archive = Archive::new(GzDecoder::new(reader));
        let mut metadata = None;
        let mut files = Vec::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry.path()?.into_owned();
            let Some(name) = strip_root(&path)? else {
                continue;
            };

            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;

            if name == CHART_YAML {
                let text = String::from_utf8(data).map_err(|e| CoreError::Archive {
                    message: format!("Invalid UTF-8 in Chart.yaml: {}", e),
                })?;
                metadata = Some(ChartMetadata::from_yaml(&text)?);
            } else {
                files.push(ChartFile { name, data });
            }
        }

        let metadata = metadata.ok_or_else(|| CoreError::InvalidChart {
            message: "archive does not contain Chart.yaml".to_string(),
        })?;
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { metadata, files })
    }

    /// Load a chart from an unpacked chart directory
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let chart_yaml = dir.join(CHART_YAML);
        if !chart_yaml.is_file() {
            return Err(CoreError::ChartNotFound {
                path: chart_yaml.display().to_string(),
            });
        }
        let metadata = ChartMetadata::from_yaml(&std::fs::read_to_string(&chart_yaml)?)?;

        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = relative_name(dir, entry.path());
            if name == CHART_YAML {
                continue;
            }
            files.push(ChartFile {
                name,
                data: std::fs::read(entry.path())?,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Self { metadata, files })
    }

    /// Default archive file name, `<name>-<version>.tgz`
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.metadata.name, self.metadata.version)
    }

    /// Encode the chart as `.tgz` bytes
    pub fn to_archive_bytes(&self) -> Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = Builder::new(encoder);
        let root = &self.metadata.name;

        let chart_yaml = self.metadata.to_yaml()?;
        add_bytes_to_archive(
            &mut builder,
            &format!("{}/{}", root, CHART_YAML),
            chart_yaml.as_bytes(),
        )?;

        let mut files: Vec<&ChartFile> = self.files.iter().collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        for file in files {
            add_bytes_to_archive(&mut builder, &format!("{}/{}", root, file.name), &file.data)?;
        }

        let encoder = builder.into_inner()?;
        Ok(encoder.finish()?)
    }

    /// Write the chart as `<dir>/<name>-<version>.tgz` and return that path
    pub fn save_archive(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let output = dir.join(self.archive_name());
        let bytes = self.to_archive_bytes()?;
        let mut file = File::create(&output)?;
        file.write_all(&bytes)?;
        Ok(output)
    }

    /// Write the chart unpacked into `target`, replacing anything already there
    pub fn export_dir(&self, target: &Path) -> Result<()> {
        if target.exists() {
            std::fs::remove_dir_all(target)?;
        }
        std::fs::create_dir_all(target)?;

        std::fs::write(target.join(CHART_YAML), self.metadata.to_yaml()?)?;
        for file in &self.files {
            let path = target.join(safe_relative_path(&file.name)?);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &file.data)?;
        }

        Ok(())
    }
}

/// Drop the top-level chart directory from an archive path
///
/// Returns `None` for the root entry itself.
fn strip_root(path: &Path) -> Result<Option<String>> {
    let mut parts = Vec::new();
    for component in path.components().skip(1) {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(CoreError::Archive {
                    message: format!("illegal path in archive: {}", path.display()),
                });
            }
        }
    }
    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("/")))
    }
}

fn safe_relative_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(CoreError::InvalidChart {
            message: format!("illegal file path: {}", name),
        });
    }
    Ok(path.to_path_buf())
}

fn relative_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Add bytes to a tar archive with a given path
fn add_bytes_to_archive<W: Write>(
    builder: &mut Builder<W>,
    archive_path: &str,
    content: &[u8],
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_cksum();

    builder.append_data(&mut header, archive_path, content)?;

    Ok(())
}
