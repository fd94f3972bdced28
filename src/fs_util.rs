use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::error::BidsError;

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub path: Utf8PathBuf,
    pub is_dir: bool,
}

/// Lists `dir` in lexical order. Listing failures are fatal for the walk;
/// entries whose names are not UTF-8 are skipped.
pub fn list_dir(dir: &Utf8Path) -> Result<Vec<Entry>, BidsError> {
    let entries = dir
        .read_dir_utf8()
        .map_err(|err| BidsError::Filesystem(format!("read dir {dir}: {err}")))?;

    let mut items = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                warn!("skipping non UTF-8 entry in {dir}: {err}");
                continue;
            }
            Err(err) => {
                return Err(BidsError::Filesystem(format!("read dir {dir}: {err}")));
            }
        };
        let path = entry.path().to_path_buf();
        items.push(Entry {
            name: entry.file_name().to_string(),
            is_dir: path.is_dir(),
            path,
        });
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// Reads a text file that may legitimately be absent.
pub fn read_optional_text(path: &Utf8Path) -> Option<String> {
    if !path.as_std_path().is_file() {
        return None;
    }
    match fs::read_to_string(path.as_std_path()) {
        Ok(content) => Some(content),
        Err(err) => {
            warn!("failed to read {path}: {err}");
            None
        }
    }
}

/// Returns the first of `names` that exists under `dir`.
pub fn first_existing(dir: &Utf8Path, names: &[&str]) -> Option<Utf8PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.as_std_path().exists())
}

pub fn to_utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf, BidsError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| BidsError::Filesystem(format!("non UTF-8 path: {}", path.display())))
}
