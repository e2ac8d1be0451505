// Model artifact registry. Artifacts live as versioned directories
// `{root}/{name}/v{N}/`; fetching copies the highest version into the local
// model directory, replacing what was there, and leaves a marker so an
// unchanged version is not copied twice.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::RegistryError;

const VERSION_MARKER: &str = ".artifact_version";

pub trait ArtifactRegistry {
    /// Makes the latest version of `name` available in `dest`, returning `dest`.
    fn fetch_latest(&self, name: &str, dest: &Path) -> Result<PathBuf, RegistryError>;
}

#[derive(Clone, Debug)]
pub struct DirectoryRegistry {
    root: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Highest `v{N}` directory of `name`.
    pub fn latest_version(&self, name: &str) -> Result<(u32, PathBuf), RegistryError> {
        let artifact_dir = self.root.join(name);
        if !artifact_dir.is_dir() {
            return Err(RegistryError::MissingArtifact {
                name: name.to_string(),
                root: self.root.clone(),
            });
        }

        let mut latest: Option<(u32, PathBuf)> = None;
        for entry in fs::read_dir(&artifact_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(version) = entry
                .file_name()
                .to_str()
                .and_then(|dir| dir.strip_prefix('v'))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            if latest.as_ref().map_or(true, |(best, _)| version > *best) {
                latest = Some((version, entry.path()));
            }
        }
        latest.ok_or_else(|| RegistryError::NoVersions(name.to_string()))
    }
}

impl ArtifactRegistry for DirectoryRegistry {
    fn fetch_latest(&self, name: &str, dest: &Path) -> Result<PathBuf, RegistryError> {
        let (version, source) = self.latest_version(name)?;
        let tag = format!("{name}:v{version}");

        let marker = dest.join(VERSION_MARKER);
        if fs::read_to_string(&marker).is_ok_and(|current| current.trim() == tag) {
            info!("{tag} already present in {}", dest.display());
            return Ok(dest.to_path_buf());
        }

        let copied = replace_dir(&source, dest, &tag)?;
        info!("Fetched {tag} ({copied} files) into {}", dest.display());
        Ok(dest.to_path_buf())
    }
}

/// Replaces `dest` with a copy of `source`. The copy is staged in a sibling
/// directory and swapped in, so nothing from the previous version survives.
/// The version marker is the last file written.
fn replace_dir(source: &Path, dest: &Path, tag: &str) -> Result<usize, RegistryError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let dir_name = dest
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    let staging = parent.join(format!(".{dir_name}.incoming"));
    let retired = parent.join(format!(".{dir_name}.retired"));

    remove_dir_if_exists(&staging)?;
    fs::create_dir_all(&staging)?;
    let copied = copy_dir(source, &staging)?;
    fs::write(staging.join(VERSION_MARKER), tag)?;

    if dest.exists() {
        remove_dir_if_exists(&retired)?;
        fs::rename(dest, &retired)?;
        fs::rename(&staging, dest)?;
        fs::remove_dir_all(&retired)?;
    } else {
        fs::rename(&staging, dest)?;
    }
    Ok(copied)
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), RegistryError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<usize, RegistryError> {
    let mut copied = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&target)?;
            copied += copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
