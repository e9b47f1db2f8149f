//! File-backed library store.
//!
//! Layout: `<root>/users/<user>/papers/<md5(id)>.json`, one JSON document
//! per paper. The stored id is kept inside the document under `id`.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::library::{LibraryBackend, StoredDocument};

/// Library documents stored as JSON files
#[derive(Debug, Clone)]
pub struct FileLibraryBackend {
    root: PathBuf,
}

impl FileLibraryBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn papers_dir(&self, user: &str) -> PathBuf {
        self.root.join("users").join(sanitize(user)).join("papers")
    }

    fn document_path(&self, user: &str, id: &str) -> PathBuf {
        self.papers_dir(user)
            .join(format!("{:x}.json", md5::compute(id.as_bytes())))
    }
}

/// Keep user keys usable as a single path component
fn sanitize(user: &str) -> String {
    let cleaned: String = user
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::PersistenceUnavailable(format!("failed to {} {}: {}", action, path.display(), e))
}

#[async_trait]
impl LibraryBackend for FileLibraryBackend {
    async fn get_all(&self, user: &str) -> Result<Vec<StoredDocument>> {
        let dir = self.papers_dir(user);
        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("read", &dir, e)),
        };

        let mut documents = Vec::new();
        while let Some(item) = reader
            .next_entry()
            .await
            .map_err(|e| io_error("read", &dir, e))?
        {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| io_error("read", &path, e))?;
            match serde_json::from_str::<Value>(&content) {
                Ok(data) => {
                    let id = data
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    documents.push(StoredDocument { id, data });
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable library document");
                }
            }
        }

        // Directory order is arbitrary; present documents oldest first
        documents.sort_by(|a, b| {
            let added = |d: &StoredDocument| {
                d.data
                    .get("dateAdded")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            added(a).cmp(&added(b)).then_with(|| a.id.cmp(&b.id))
        });

        tracing::debug!(user, count = documents.len(), "Read library documents");
        Ok(documents)
    }

    async fn set(&self, user: &str, id: &str, data: &Value) -> Result<()> {
        let dir = self.papers_dir(user);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error("create", &dir, e))?;

        let mut data = data.clone();
        if let Value::Object(map) = &mut data {
            map.insert("id".to_string(), Value::String(id.to_string()));
        }
        let content = serde_json::to_string_pretty(&data)
            .map_err(|e| Error::PersistenceUnavailable(format!("failed to encode document: {}", e)))?;

        let path = self.document_path(user, id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| io_error("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error("replace", &path, e))?;

        Ok(())
    }

    async fn delete(&self, user: &str, id: &str) -> Result<()> {
        let path = self.document_path(user, id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_get_delete() {
        let dir = tempdir().unwrap();
        let backend = FileLibraryBackend::new(dir.path());

        backend
            .set("alice", "http://arxiv.org/abs/1v1", &json!({"title": "One", "dateAdded": "2024-01-02"}))
            .await
            .unwrap();
        backend
            .set("alice", "p2", &json!({"title": "Two", "dateAdded": "2024-01-01"}))
            .await
            .unwrap();

        let docs = backend.get_all("alice").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "p2");
        assert_eq!(docs[1].id, "http://arxiv.org/abs/1v1");
        assert_eq!(docs[1].data["title"], "One");

        backend.delete("alice", "p2").await.unwrap();
        backend.delete("alice", "p2").await.unwrap();
        assert_eq!(backend.get_all("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_replaces() {
        let dir = tempdir().unwrap();
        let backend = FileLibraryBackend::new(dir.path());

        backend.set("bob", "p", &json!({"title": "Old"})).await.unwrap();
        backend.set("bob", "p", &json!({"title": "New"})).await.unwrap();

        let docs = backend.get_all("bob").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["title"], "New");
    }

    #[tokio::test]
    async fn test_users_are_separate_and_missing_user_is_empty() {
        let dir = tempdir().unwrap();
        let backend = FileLibraryBackend::new(dir.path());

        backend.set("a", "p", &json!({"title": "A's"})).await.unwrap();
        assert!(backend.get_all("b").await.unwrap().is_empty());
        assert!(backend.get_all("../a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_documents_are_skipped() {
        let dir = tempdir().unwrap();
        let backend = FileLibraryBackend::new(dir.path());
        backend.set("u", "good", &json!({"title": "Good"})).await.unwrap();

        let papers = dir.path().join("users").join("u").join("papers");
        std::fs::write(papers.join("broken.json"), "{not json").unwrap();
        std::fs::write(papers.join("notes.txt"), "ignored").unwrap();

        let docs = backend.get_all("u").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "good");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("alice"), "alice");
        assert_eq!(sanitize("a/b\\c"), "a_b_c");
        assert_eq!(sanitize(".."), "default");
        assert_eq!(sanitize(""), "default");
    }
}
