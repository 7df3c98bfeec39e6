/*!
 * Common test utilities for the lingodoc test suite
 */

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use lingodoc::{RetryPolicy, TranslatorConfig};

/// Initialize test logging once; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Client configuration with millisecond-scale retries and polling so the
/// suite stays fast
pub fn fast_config(server_url: &str) -> TranslatorConfig {
    TranslatorConfig::new("test-auth-key", server_url)
        .retry(fast_retry_policy(3))
        .poll_interval(Duration::from_millis(10))
}

/// Retry policy with tiny delays for mock-server tests
pub fn fast_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        attempt_timeout: Duration::from_secs(5),
        overall_timeout: None,
        initial_delay: Duration::from_millis(5),
        multiplier: 1.6,
        max_delay: Duration::from_millis(50),
        jitter: 0.23,
    }
}

/// Deterministic pseudo-content for fixture media files.
///
/// A multiplicative hash keeps the bytes incompressible enough that the
/// size assertions around minification have real margin.
pub fn media_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| {
            let mixed = (i as u32)
                .wrapping_add(seed as u32)
                .wrapping_mul(2_654_435_761);
            (mixed >> 24) as u8 ^ (mixed >> 8) as u8
        })
        .collect()
}

/// Entries written into the office document fixture, as (archive path, bytes)
pub fn office_fixture_entries() -> Vec<(String, Vec<u8>)> {
    vec![
        (
            "[Content_Types].xml".to_string(),
            b"<Types><Default Extension=\"xml\"/></Types>".to_vec(),
        ),
        (
            "ppt/slides/slide1.xml".to_string(),
            b"<p:sld><a:t>Hello from slide one</a:t></p:sld>".to_vec(),
        ),
        (
            "ppt/media/image1.png".to_string(),
            media_bytes(40_000, 3),
        ),
        (
            "ppt/media/image2.jpeg".to_string(),
            media_bytes(40_000, 7),
        ),
        (
            "ppt/media/movie1.mp4".to_string(),
            media_bytes(400_000, 11),
        ),
    ]
}

/// Build a zip-based office document fixture containing slide XML plus
/// embedded media, returning its path
pub fn build_office_fixture(dir: &Path, filename: &str) -> Result<PathBuf> {
    let path = dir.join(filename);
    let file = fs::File::create(&path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in office_fixture_entries() {
        writer.start_file(name, options)?;
        writer.write_all(&content)?;
    }
    writer.finish()?;

    Ok(path)
}

/// Read every file entry of a zip archive into a sorted name -> bytes map
pub fn read_archive_entries(path: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let file = fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entries = BTreeMap::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        entries.insert(entry.name().to_string(), content);
    }

    Ok(entries)
}
