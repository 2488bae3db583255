//! Enrollment input listing: one subdirectory per identity.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensions accepted as enrollment images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no images found in {0}")]
    NoImages(PathBuf),
}

/// One enrollment image and the identity it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledImage {
    pub label: String,
    pub path: PathBuf,
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}

/// List `(label, image)` pairs under `root`.
///
/// Every immediate subdirectory is a label; labels and the images inside each
/// are visited in lexicographic order. Files directly under `root` and
/// non-image files are ignored.
pub fn list_labeled_images(root: &Path) -> Result<Vec<LabeledImage>, DatasetError> {
    let mut items = Vec::new();

    for dir in read_dir_sorted(root)?.into_iter().filter(|p| p.is_dir()) {
        let Some(label) = dir.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            tracing::warn!(dir = %dir.display(), "skipping directory with non-UTF-8 name");
            continue;
        };

        let images: Vec<PathBuf> = read_dir_sorted(&dir)?
            .into_iter()
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        tracing::debug!(label = %label, images = images.len(), "found label directory");

        items.extend(images.into_iter().map(|path| LabeledImage {
            label: label.clone(),
            path,
        }));
    }

    if items.is_empty() {
        return Err(DatasetError::NoImages(root.to_path_buf()));
    }
    Ok(items)
}
