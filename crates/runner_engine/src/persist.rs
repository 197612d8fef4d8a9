//! The single on-disk document behind the durable store tier.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{0:?} exists but is not a directory")]
    NotADirectory(PathBuf),
    #[error("cannot create files in {dir:?}: {source}")]
    Unwritable {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A named document inside the store directory.
///
/// Readers never see a half-written document: every replacement goes to a
/// sibling temp file that is then renamed over the old one.
#[derive(Debug, Clone)]
pub struct StoreDocument {
    dir: PathBuf,
    name: String,
}

impl StoreDocument {
    /// Takes `dir` for the document, creating it when missing. Fails unless
    /// files can actually be created there.
    pub fn claim(dir: &Path, name: &str) -> Result<Self, PersistError> {
        match fs::metadata(dir) {
            Ok(meta) if !meta.is_dir() => {
                return Err(PersistError::NotADirectory(dir.to_path_buf()))
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => fs::create_dir_all(dir)
                .map_err(|source| PersistError::Unwritable {
                    dir: dir.to_path_buf(),
                    source,
                })?,
            Err(err) => return Err(err.into()),
        }
        NamedTempFile::new_in(dir).map_err(|source| PersistError::Unwritable {
            dir: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    /// `Ok(None)` when the document was never written.
    pub fn load(&self) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(self.path()) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn replace(&self, content: &str) -> Result<(), PersistError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(self.path()).map_err(|err| PersistError::Io(err.error))?;
        Ok(())
    }
}
