//! Native model artifacts
//!
//! The fitted forest is written as a byte-exact snapshot next to a
//! `<file>.hash` sidecar holding the BLAKE3 digest of those bytes. Files
//! ending in `.json` use canonical JSON; everything else uses `bincode`.

use crate::forest::{ForestModel, ModelError};
use crate::serde_canon::hash_bytes_hex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Encoding of a native artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Bincode,
    CanonicalJson,
}

impl ArtifactFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ArtifactFormat::CanonicalJson,
            _ => ArtifactFormat::Bincode,
        }
    }
}

/// Result of writing an artifact to disk
#[derive(Debug, Clone)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub hash_path: PathBuf,
    pub hash_hex: String,
    pub bytes: usize,
}

/// Sidecar path for an artifact (`asl_model.pkl` -> `asl_model.pkl.hash`)
pub fn hash_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".hash");
    PathBuf::from(name)
}

pub fn encode_artifact(
    model: &ForestModel,
    format: ArtifactFormat,
) -> Result<Vec<u8>, ModelError> {
    match format {
        ArtifactFormat::Bincode => model.to_bincode(),
        ArtifactFormat::CanonicalJson => Ok(model.to_canonical_json()?.into_bytes()),
    }
}

pub fn decode_artifact(bytes: &[u8], format: ArtifactFormat) -> Result<ForestModel, ModelError> {
    match format {
        ArtifactFormat::Bincode => ForestModel::from_bincode(bytes),
        ArtifactFormat::CanonicalJson => {
            let model: ForestModel = serde_json::from_slice(bytes)?;
            model.validate()?;
            Ok(model)
        }
    }
}

fn staged(dir: &Path, contents: &[u8]) -> io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    Ok(file)
}

/// Write the model and its hash sidecar, replacing any existing files.
///
/// Both files are staged next to the target and renamed into place. The old
/// sidecar is removed before the artifact is replaced; a new artifact never
/// sits beside a stale digest.
pub fn save_artifact<P: AsRef<Path>>(
    path: P,
    model: &ForestModel,
) -> Result<SavedArtifact, ModelError> {
    let path = path.as_ref();
    model.validate()?;

    let bytes = encode_artifact(model, ArtifactFormat::from_path(path))?;
    let hash_hex = hash_bytes_hex(&bytes);
    let hash_path = hash_path_for(path);

    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let artifact_file = staged(dir, &bytes)?;
    let hash_file = staged(dir, hash_hex.as_bytes())?;

    match fs::remove_file(&hash_path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    artifact_file.persist(path).map_err(|err| err.error)?;
    hash_file.persist(&hash_path).map_err(|err| err.error)?;
    debug!("wrote {} bytes to {}", bytes.len(), path.display());

    Ok(SavedArtifact {
        path: path.to_path_buf(),
        hash_path,
        hash_hex,
        bytes: bytes.len(),
    })
}

/// Load and validate an artifact, checking the sidecar digest when present
pub fn load_artifact<P: AsRef<Path>>(path: P) -> Result<ForestModel, ModelError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;

    let hash_path = hash_path_for(path);
    if hash_path.exists() {
        let expected = fs::read_to_string(&hash_path)?.trim().to_string();
        let actual = hash_bytes_hex(&bytes);
        if expected != actual {
            return Err(ModelError::HashMismatch { expected, actual });
        }
    } else {
        warn!("no hash sidecar at {}, skipping integrity check", hash_path.display());
    }

    decode_artifact(&bytes, ArtifactFormat::from_path(path))
}
