//! The backend contract every storage adapter implements

use crate::listing::Listing;
use blobio_core::{Error, Result};
use std::fmt;
use std::io::{Read, Seek, Write};
use std::str::FromStr;
use std::time::SystemTime;

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `r` / `rb`
    Read,
    /// `w` / `wb`, truncating
    Write,
    /// `a` / `ab`
    Append,
    /// `r+` / `rb+`
    ReadWrite,
}

impl OpenMode {
    pub fn is_write(self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

impl FromStr for OpenMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self> {
        // Text and binary modes behave identically on byte streams
        let normalized: String = mode.chars().filter(|c| *c != 'b' && *c != 't').collect();
        match normalized.as_str() {
            "r" => Ok(OpenMode::Read),
            "w" => Ok(OpenMode::Write),
            "a" => Ok(OpenMode::Append),
            "r+" | "+r" => Ok(OpenMode::ReadWrite),
            _ => Err(Error::configuration(format!("invalid open mode '{mode}'"))),
        }
    }
}

/// A byte stream returned by [`FileSystem::open`]
pub trait FileHandle: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> FileHandle for T {}

/// Metadata returned by [`FileSystem::stat`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub path: String,
    pub size: u64,
    pub mtime: Option<SystemTime>,
    pub is_dir: bool,
}

/// A storage backend addressed by string paths.
///
/// Backends that cannot express an operation (object stores have no real
/// directories) keep the default implementation, which reports
/// [`Error::Unsupported`].
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// URL scheme this backend is registered under
    fn scheme(&self) -> &'static str;

    fn open(&self, path: &str, mode: OpenMode) -> Result<Box<dyn FileHandle>>;

    fn stat(&self, path: &str) -> Result<FileStat>;

    /// Lazily list entries below `prefix`
    fn list(&self, prefix: &str, recursive: bool) -> Result<Listing>;

    fn exists(&self, path: &str) -> Result<bool>;

    fn rename(&self, src: &str, dst: &str) -> Result<()>;

    fn remove(&self, path: &str, recursive: bool) -> Result<()>;

    fn mkdir(&self, path: &str) -> Result<()> {
        let _ = path;
        Err(Error::unsupported(
            self.scheme(),
            "mkdir",
            "backend has no directories",
        ))
    }

    fn makedirs(&self, path: &str, exist_ok: bool) -> Result<()> {
        let _ = (path, exist_ok);
        Err(Error::unsupported(
            self.scheme(),
            "makedirs",
            "backend has no directories",
        ))
    }

    /// Size in bytes, as reported by `stat`
    fn size(&self, path: &str) -> Result<u64> {
        Ok(self.stat(path)?.size)
    }
}
