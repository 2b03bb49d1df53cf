use ignore::WalkBuilder;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::ScanError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub contents: String,
}

/// Matched source files in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceBundle {
    files: Vec<SourceFile>,
}

impl SourceBundle {
    pub fn push(&mut self, name: impl Into<String>, contents: impl Into<String>) {
        self.files.push(SourceFile {
            name: name.into(),
            contents: contents.into(),
        });
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Concatenate every file, each preceded by a `// File: <name>` line.
    pub fn text(&self) -> String {
        let capacity = self
            .files
            .iter()
            .map(|f| f.name.len() + f.contents.len() + 12)
            .sum();
        let mut out = String::with_capacity(capacity);
        for file in &self.files {
            let _ = write!(out, "\n\n// File: {}\n{}", file.name, file.contents);
        }
        out
    }
}

/// Collect every file under `root` whose name ends with `extension`.
///
/// The walk is depth-first in whatever order the filesystem lists entries;
/// nothing is sorted and no ignore files are honored. Any unreadable
/// directory or file aborts the whole scan.
pub fn scan_directory(root: &Path, extension: &str) -> Result<SourceBundle, ScanError> {
    let mut bundle = SourceBundle::default();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !name.ends_with(extension) {
            continue;
        }

        let path = entry.path();
        let bytes = fs::read(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("scanned {} ({} bytes)", path.display(), bytes.len());
        bundle.push(name.into_owned(), String::from_utf8_lossy(&bytes).into_owned());
    }

    log::info!(
        "found {} {} files under {}",
        bundle.len(),
        extension,
        root.display()
    );
    Ok(bundle)
}
