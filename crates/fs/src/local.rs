//! Local POSIX filesystem backend

use crate::backend::{FileHandle, FileStat, FileSystem, OpenMode};
use crate::listing::Listing;
use blobio_core::{Error, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files on the local disk, with relative paths resolved against `root`
#[derive(Debug, Clone)]
pub struct Local {
    root: PathBuf,
}

impl Local {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for Local {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileSystem for Local {
    fn scheme(&self) -> &'static str {
        "file"
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn FileHandle>> {
        let full = self.resolve(path);
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true).create(true),
            OpenMode::ReadWrite => options.read(true).write(true),
        };

        let file = options
            .open(&full)
            .map_err(|e| Error::file_system(&full, "open", e))?;
        tracing::trace!(path = %full.display(), ?mode, "opened local file");
        Ok(Box::new(file))
    }

    fn stat(&self, path: &str) -> Result<FileStat> {
        let full = self.resolve(path);
        let metadata = fs::metadata(&full).map_err(|e| Error::file_system(&full, "stat", e))?;
        Ok(FileStat {
            path: path.to_string(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
            is_dir: metadata.is_dir(),
        })
    }

    fn list(&self, prefix: &str, recursive: bool) -> Result<Listing> {
        let base = self.resolve(prefix);
        if !base.is_dir() {
            return Err(Error::NotFound { path: base });
        }

        if recursive {
            Listing::restartable(move || {
                let base = base.clone();
                let walker = WalkDir::new(&base).min_depth(1).sort_by_file_name();
                Ok(Box::new(walker.into_iter().map(move |entry| {
                    let entry = entry.map_err(|e| {
                        let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                        Error::file_system(path, "walk directory", e.into())
                    })?;
                    let relative = entry.path().strip_prefix(&base).unwrap_or(entry.path());
                    Ok(relative.to_string_lossy().into_owned())
                })) as Box<dyn Iterator<Item = Result<String>> + Send>)
            })
        } else {
            Listing::restartable(move || {
                let entries =
                    fs::read_dir(&base).map_err(|e| Error::file_system(&base, "read_dir", e))?;
                let dir = base.clone();
                Ok(Box::new(entries.map(move |entry| {
                    let entry = entry.map_err(|e| Error::file_system(&dir, "read_dir", e))?;
                    Ok(entry.file_name().to_string_lossy().into_owned())
                })) as Box<dyn Iterator<Item = Result<String>> + Send>)
            })
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path).exists())
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        let from = self.resolve(src);
        let to = self.resolve(dst);
        fs::rename(&from, &to).map_err(|e| Error::file_system(&from, "rename", e))
    }

    fn remove(&self, path: &str, recursive: bool) -> Result<()> {
        let full = self.resolve(path);
        let result = if full.is_dir() {
            if recursive {
                fs::remove_dir_all(&full)
            } else {
                fs::remove_dir(&full)
            }
        } else {
            fs::remove_file(&full)
        };
        result.map_err(|e| Error::file_system(&full, "remove", e))
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let full = self.resolve(path);
        fs::create_dir(&full).map_err(|e| Error::file_system(&full, "mkdir", e))
    }

    fn makedirs(&self, path: &str, exist_ok: bool) -> Result<()> {
        let full = self.resolve(path);
        if full.exists() && !exist_ok {
            return Err(Error::file_system(
                &full,
                "makedirs",
                std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            ));
        }
        fs::create_dir_all(&full).map_err(|e| Error::file_system(&full, "makedirs", e))
    }
}
