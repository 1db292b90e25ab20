use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{DocumentStore, FieldFilter};
use crate::error::StoreError;

/// Stores each document as `<root>/<collection>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

/// Keep `[A-Za-z0-9_.-]`, percent-encode every other byte. A leading '.' is encoded
/// too so no key can name a hidden file or a parent directory.
fn escape_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let keep = byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' || (byte == b'.' && i > 0);
        if keep {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into() }
    }


    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.base_path.join(escape_component(collection))
    }

    fn document_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", escape_component(key)))
    }

    /// Insert every element of a JSON array file into `collection`. Returns the count.
    pub async fn import_records(&self, collection: &str, path: &Path) -> Result<usize, StoreError> {
        let content = fs::read_to_string(path).await?;
        let records: Vec<Value> = serde_json::from_str(&content)?;
        let mut imported = 0;
        for record in records {
            if !record.is_object() {
                warn!(collection, "Skipping non-object record during import");
                continue;
            }
            self.insert(collection, record).await?;
            imported += 1;
        }
        info!(collection, imported, path = %path.display(), "Imported records");
        Ok(imported)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.document_path(collection, key);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, collection: &str, key: &str, document: Value) -> Result<(), StoreError> {
        let file_path = self.document_path(collection, key);

        // Ensure the directory exists
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write beside the target and rename, so readers never see a partial document.
        let tmp_path = file_path.with_extension(format!("json.{}.tmp", super::new_document_id()));
        let content = serde_json::to_vec_pretty(&document)?;
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&content).await?;
        file.flush().await?;
        drop(file);
        fs::rename(&tmp_path, &file_path).await?;

        debug!(collection, key, path = %file_path.display(), "file store put");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[FieldFilter],
        limit: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let dir = self.collection_dir(collection);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut hits = Vec::new();
        for path in paths {
            if hits.len() >= limit {
                break;
            }
            let content = fs::read_to_string(&path).await?;
            let document: Value = match serde_json::from_str(&content) {
                Ok(document) => document,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                    continue;
                }
            };
            if filters.iter().all(|f| f.matches(&document)) {
                hits.push(document);
            }
        }
        Ok(hits)
    }
}
