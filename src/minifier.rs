/*!
 * Archive minification for oversized office documents.
 *
 * Zip-based office documents (pptx, docx) are often dominated by embedded
 * media the translation service never looks at. The minifier strips that
 * media out before upload and restores it into the translated result
 * afterwards, working entirely through a dedicated working directory:
 *
 * ```text
 * <working dir>/extracted/        unzipped document contents
 * <working dir>/original-media/   backed-up media, relative paths preserved
 * <working dir>/minifiedDoc.<ext> the reduced archive handed to the upload
 * ```
 *
 * One instance is scoped to exactly one input document and one working
 * directory; minifying two documents concurrently requires two instances
 * with distinct working directories.
 */

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use once_cell::sync::Lazy;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::MinifyError;

/// Subdirectory holding the unzipped document contents
const EXTRACTED_DIR: &str = "extracted";
/// Subdirectory holding backed-up media files
const MEDIA_BACKUP_DIR: &str = "original-media";
/// File stem of the minified archive inside the working directory
const MINIFIED_DOC_STEM: &str = "minifiedDoc";

/// Payload written over each stripped media file
const MEDIA_PLACEHOLDER: &[u8] = b"media removed for translation";

/// Archives still larger than this after minification get a warning
const SIZE_WARNING_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Extensions of embedded media worth stripping: images, video and audio
/// formats commonly found inside office documents
static MEDIA_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        // images
        "png", "jpg", "jpeg", "emf", "bmp", "tiff", "webp", "svg", "gif", "ico",
        // video
        "mp4", "m4v", "avi", "mov", "wmv", "mpg", "mpeg", "asf",
        // audio
        "mp3", "m4a", "wav", "wma", "ogg", "flac",
    ])
});

/// Archive extensions the minifier knows how to rewrite
static MINIFIABLE_EXTENSIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["pptx", "docx", "zip"]));

/// Strips media from one document and restores it after translation.
///
/// The instance is bound to a single working directory at construction; the
/// original input file is never mutated.
#[derive(Debug)]
pub struct DocumentMinifier {
    working_dir: PathBuf,
}

impl DocumentMinifier {
    /// Create a minifier bound to the given working directory
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        DocumentMinifier {
            working_dir: working_dir.into(),
        }
    }

    /// True when the file type is a zip-based document the minifier supports
    pub fn can_minify(path: &Path) -> bool {
        file_extension(path)
            .map(|ext| MINIFIABLE_EXTENSIONS.contains(ext.as_str()))
            .unwrap_or(false)
    }

    /// Working directory this instance is bound to
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Path the minified archive will be written to for the given input
    pub fn minified_path(&self, input: &Path) -> PathBuf {
        let extension = file_extension(input).unwrap_or_else(|| "zip".to_string());
        self.working_dir
            .join(format!("{}.{}", MINIFIED_DOC_STEM, extension))
    }

    /// Strip embedded media out of `input` and build a reduced archive.
    ///
    /// Media files are moved into the backup directory with their relative
    /// paths preserved and replaced in place by a short placeholder, then the
    /// tree is re-zipped. With `cleanup` the extracted tree is deleted; the
    /// media backup is always retained for the later restore. Returns the
    /// path of the minified archive.
    pub fn minify(&self, input: &Path, cleanup: bool) -> Result<PathBuf, MinifyError> {
        let extracted = self.working_dir.join(EXTRACTED_DIR);
        extract_archive(input, &extracted)?;

        let backed_up = self.backup_media(&extracted)?;
        debug!(
            "Backed up {} media file(s) from {:?}",
            backed_up,
            input.file_name().unwrap_or_default()
        );

        let minified = self.minified_path(input);
        build_archive(&extracted, &minified)?;

        if cleanup {
            remove_best_effort(&extracted);
        }

        if let Ok(metadata) = fs::metadata(&minified) {
            if metadata.len() > SIZE_WARNING_THRESHOLD {
                warn!(
                    "Minified archive {:?} is still {} bytes; the service may reject it",
                    minified,
                    metadata.len()
                );
            }
        }

        Ok(minified)
    }

    /// Reinsert the backed-up media into a translated, still-minified archive.
    ///
    /// `input` is unzipped into the extracted tree, each backup is moved back
    /// over its placeholder via a pure relative-path join, and the tree is
    /// re-zipped into `output` (replacing any existing file there). With
    /// `cleanup` the entire working directory is deleted afterwards.
    pub fn deminify(
        &self,
        input: &Path,
        output: &Path,
        cleanup: bool,
    ) -> Result<(), MinifyError> {
        let extracted = self.working_dir.join(EXTRACTED_DIR);
        if !extracted.exists() {
            fs::create_dir_all(&extracted).map_err(|source| MinifyError::CreateDir {
                path: extracted.clone(),
                source,
            })?;
        }
        extract_archive(input, &extracted)?;

        let restored = self.restore_media(&extracted)?;
        debug!("Restored {} media file(s) into {:?}", restored, output);

        if output.exists() {
            fs::remove_file(output).map_err(|source| MinifyError::ReplaceOutput {
                path: output.to_path_buf(),
                source,
            })?;
        }
        build_archive(&extracted, output)?;

        if cleanup {
            remove_best_effort(&self.working_dir);
        }

        Ok(())
    }

    /// Move every supported media file under `extracted` into the backup
    /// directory and overwrite it with the placeholder payload
    fn backup_media(&self, extracted: &Path) -> Result<usize, MinifyError> {
        let backup_root = self.working_dir.join(MEDIA_BACKUP_DIR);
        let mut count = 0;

        for entry in WalkDir::new(extracted) {
            let entry = entry.map_err(|error| MinifyError::BackupMedia {
                path: extracted.to_path_buf(),
                source: io::Error::other(error),
            })?;
            if !entry.file_type().is_file() || !is_media_file(entry.path()) {
                continue;
            }

            let path = entry.path();
            let relative = relative_to(path, extracted)?;
            let backup_path = backup_root.join(&relative);

            if let Some(parent) = backup_path.parent() {
                fs::create_dir_all(parent).map_err(|source| MinifyError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            fs::rename(path, &backup_path).map_err(|source| MinifyError::BackupMedia {
                path: path.to_path_buf(),
                source,
            })?;
            fs::write(path, MEDIA_PLACEHOLDER).map_err(|source| MinifyError::BackupMedia {
                path: path.to_path_buf(),
                source,
            })?;
            count += 1;
        }

        Ok(count)
    }

    /// Move every backed-up file to its corresponding place under `extracted`,
    /// deleting the placeholder that sits there
    fn restore_media(&self, extracted: &Path) -> Result<usize, MinifyError> {
        let backup_root = self.working_dir.join(MEDIA_BACKUP_DIR);
        let mut count = 0;

        if !backup_root.exists() {
            return Ok(0);
        }

        for entry in WalkDir::new(&backup_root) {
            let entry = entry.map_err(|error| MinifyError::RestoreMedia {
                path: backup_root.clone(),
                source: io::Error::other(error),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = relative_to(path, &backup_root)?;
            let target = extracted.join(&relative);

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|source| MinifyError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            if target.exists() {
                fs::remove_file(&target).map_err(|source| MinifyError::RestoreMedia {
                    path: target.clone(),
                    source,
                })?;
            }
            fs::rename(path, &target).map_err(|source| MinifyError::RestoreMedia {
                path: path.to_path_buf(),
                source,
            })?;
            count += 1;
        }

        Ok(count)
    }
}

/// Lowercased extension of a path, if it has one
fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// True when the file extension belongs to the supported media set
fn is_media_file(path: &Path) -> bool {
    file_extension(path)
        .map(|ext| MEDIA_EXTENSIONS.contains(ext.as_str()))
        .unwrap_or(false)
}

/// Relative path of `path` under `base`
fn relative_to(path: &Path, base: &Path) -> Result<PathBuf, MinifyError> {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .map_err(|error| MinifyError::BackupMedia {
            path: path.to_path_buf(),
            source: io::Error::other(error),
        })
}

/// Unzip `archive` into `dest`, creating it as needed
fn extract_archive(archive: &Path, dest: &Path) -> Result<(), MinifyError> {
    let wrap = |source: io::Error| MinifyError::Extract {
        archive: archive.to_path_buf(),
        dest: dest.to_path_buf(),
        source,
    };

    let file = fs::File::open(archive).map_err(wrap)?;
    let mut reader = ZipArchive::new(file).map_err(|error| wrap(io::Error::other(error)))?;
    reader
        .extract(dest)
        .map_err(|error| wrap(io::Error::other(error)))
}

/// Zip the contents of `src_dir` into a new archive at `dest`.
///
/// Entry names are the paths relative to `src_dir` with forward slashes, so
/// the archive layout matches the extracted tree exactly.
fn build_archive(src_dir: &Path, dest: &Path) -> Result<(), MinifyError> {
    let wrap = |source: io::Error| MinifyError::Archive {
        path: dest.to_path_buf(),
        source,
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    let file = fs::File::create(dest).map_err(wrap)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(src_dir) {
        let entry = entry.map_err(|error| wrap(io::Error::other(error)))?;
        let path = entry.path();
        if path == src_dir {
            continue;
        }

        let relative = path
            .strip_prefix(src_dir)
            .map_err(|error| wrap(io::Error::other(error)))?;
        let name = relative.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{}/", name), options)
                .map_err(|error| wrap(io::Error::other(error)))?;
        } else {
            writer
                .start_file(name, options)
                .map_err(|error| wrap(io::Error::other(error)))?;
            let mut source_file = fs::File::open(path).map_err(wrap)?;
            io::copy(&mut source_file, &mut writer).map_err(wrap)?;
        }
    }

    writer
        .finish()
        .map_err(|error| wrap(io::Error::other(error)))?;
    Ok(())
}

/// Best-effort recursive delete; cleanup failures are logged, never raised
fn remove_best_effort(path: &Path) {
    if let Err(error) = fs::remove_dir_all(path) {
        warn!("Failed to clean up {:?}: {}", path, error);
    }
}
