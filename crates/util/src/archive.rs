//! In-memory zip archives for workflow dependencies.

use std::collections::HashSet;
use std::io::{Cursor, Read, Write};

use indexmap::IndexMap;
use url::Url;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ArchiveError;
use crate::resource::is_remote_reference;

/// Build a zip archive from `(name, content)` pairs.
///
/// Each entry is stored under the last path segment of its name, so
/// `https://host/tasks/align.wdl` and `/local/tasks/align.wdl` both become
/// `align.wdl`. Two entries that collapse to the same name are rejected.
pub fn build_zip<I, N, B>(entries: I) -> Result<Vec<u8>, ArchiveError>
where
    I: IntoIterator<Item = (N, B)>,
    N: AsRef<str>,
    B: AsRef<[u8]>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut seen = HashSet::new();

    for (name, content) in entries {
        let entry_name = archive_entry_name(name.as_ref())?;
        if !seen.insert(entry_name.clone()) {
            return Err(ArchiveError::DuplicateEntry { name: entry_name });
        }
        writer.start_file(entry_name, options)?;
        writer.write_all(content.as_ref())?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Read every file entry of an in-memory zip archive, in archive order.
pub fn extract_zip(bytes: &[u8]) -> Result<IndexMap<String, Vec<u8>>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = IndexMap::new();
    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        if file.is_dir() {
            continue;
        }
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        entries.insert(file.name().to_string(), content);
    }
    Ok(entries)
}

/// The file name an archive entry is stored under.
pub fn archive_entry_name(name: &str) -> Result<String, ArchiveError> {
    let trimmed = name.trim();
    let path_part = if is_remote_reference(trimmed) {
        Url::parse(trimmed)
            .ok()
            .and_then(|url| url.path_segments().and_then(|mut segments| segments.next_back().map(str::to_string)))
            .unwrap_or_default()
    } else {
        trimmed.rsplit(['/', '\\']).next().unwrap_or_default().to_string()
    };

    if path_part.is_empty() || path_part == "." || path_part == ".." {
        return Err(ArchiveError::InvalidEntryName { name: name.to_string() });
    }
    Ok(path_part)
}
