use async_trait::async_trait;
use domain::models::Document;
use domain::services::DocumentSource;
use domain::{RagError, Result};
use memmap2::Mmap;
use rayon::prelude::*;
use shared::utils::is_supported_file;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Loads local text files (or every supported file under a directory) as documents.
#[derive(Clone)]
pub struct FileScanner {
    ignored_dirs: HashSet<String>,
    max_file_bytes: u64,
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl FileScanner {
    pub fn new() -> Self {
        Self {
            ignored_dirs: [
                ".git",
                "target",
                "node_modules",
                ".next",
                "dist",
                "build",
                ".idea",
                ".vscode",
                ".cache",
                "venv",
                "__pycache__",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_file_bytes: 2 * 1024 * 1024,
        }
    }

    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    /// Expands locators into file paths. Explicit files are kept whatever their extension.
    pub fn collect_files(&self, locators: &[String]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for locator in locators {
            let path = PathBuf::from(locator);
            if path.is_dir() {
                self.collect_files_recursive(&path, &mut files)
                    .map_err(|err| RagError::fetch(locator.as_str(), err))?;
            } else if path.is_file() {
                files.push(path);
            } else {
                return Err(RagError::fetch(locator.as_str(), "no such file or directory"));
            }
        }
        Ok(files)
    }

    fn collect_files_recursive(&self, dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        entries.sort();
        for path in entries {
            if path.is_dir() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    if self.ignored_dirs.contains(name) {
                        continue;
                    }
                }
                self.collect_files_recursive(&path, files)?;
            } else if is_supported_file(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Reads files in parallel; oversized files are skipped, unreadable ones fail the scan.
    pub fn scan_paths(&self, paths: &[PathBuf]) -> Result<Vec<Document>> {
        let results: Vec<Result<Option<Document>>> = paths
            .par_iter()
            .map(|path| self.load_file(path))
            .collect();
        let mut documents = Vec::with_capacity(paths.len());
        for res in results {
            if let Some(document) = res? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    fn load_file(&self, path: &Path) -> Result<Option<Document>> {
        let locator = path.to_string_lossy().to_string();
        let meta = path.metadata().map_err(|err| RagError::fetch(locator.as_str(), err))?;
        if meta.len() > self.max_file_bytes {
            warn!(path = %locator, bytes = meta.len(), "skipping oversized file");
            return Ok(None);
        }
        // Zero-length files cannot be mapped.
        let content = if meta.len() == 0 {
            String::new()
        } else {
            let file = File::open(path).map_err(|err| RagError::fetch(locator.as_str(), err))?;
            // SAFETY: the map is read once and copied out before the file handle is dropped.
            let mmap =
                unsafe { Mmap::map(&file) }.map_err(|err| RagError::fetch(locator.as_str(), err))?;
            // Lossy conversion ensures non-UTF8 bytes don't crash scanning.
            String::from_utf8_lossy(&mmap).into_owned()
        };
        let hash = format!("{:x}", md5::compute(content.as_bytes()));
        Ok(Some(Document::new(locator, content).with_metadata("md5", hash)))
    }
}

#[async_trait]
impl DocumentSource for FileScanner {
    async fn load(&self, locators: &[String]) -> Result<Vec<Document>> {
        let scanner = self.clone();
        let locators = locators.to_vec();
        let documents = tokio::task::spawn_blocking(move || {
            let files = scanner.collect_files(&locators)?;
            scanner.scan_paths(&files)
        })
        .await
        .map_err(|err| RagError::Storage(format!("file scan task failed: {err}")))??;
        info!(files = documents.len(), "loaded local files");
        Ok(documents)
    }
}
