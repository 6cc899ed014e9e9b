//! Local file-backed vector store.
//!
//! Each namespace/collection owns a directory with three files:
//!
//! * `vectors.json` — the vector index, insertion order.
//! * `meta.json` — ids, texts, and metadata, index-aligned with the vectors.
//! * `manifest.json` — the generation counter, renamed into place last and
//!   acting as the commit point for a paired write.
//!
//! Both artifacts embed the generation they were written under. Before every
//! search the manifest generation is compared with the in-memory copy and
//! both artifacts are reloaded together when another process has written
//! since the last load; a search never runs against a vector index and a
//! metadata array from different generations. Generation counters replace
//! mtime polling so filesystem timestamp resolution can't race a reload.
//!
//! Concurrent writers are not coordinated here (callers must serialize
//! `store_documents` externally); one writer plus any number of readers is
//! the supported concurrency shape.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::{Result, WebloreError};
use crate::types::{Chunk, DocumentMetadata, SearchHit};

use super::{VectorBackend, build_documents, dot, normalize};

const VECTORS_FILE: &str = "vectors.json";
const META_FILE: &str = "meta.json";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Serialize, Deserialize)]
struct VectorArtifact {
    generation: u64,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct MetaArtifact {
    generation: u64,
    ids: Vec<String>,
    texts: Vec<String>,
    metadatas: Vec<DocumentMetadata>,
}

#[derive(Serialize, Deserialize)]
struct Manifest {
    generation: u64,
}

/// In-memory view of one generation of the on-disk artifacts.
#[derive(Default)]
struct State {
    generation: u64,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    ids: Vec<String>,
    texts: Vec<String>,
    metadatas: Vec<DocumentMetadata>,
}

/// File-artifact vector store for one namespace/collection.
pub struct LocalVectorStore {
    dir: PathBuf,
    namespace: String,
    state: Mutex<State>,
}

impl LocalVectorStore {
    /// Opens (or initializes) the store rooted at
    /// `root/<namespace>/<collection>`.
    ///
    /// Missing artifacts mean "empty store", not an error.
    pub async fn open(
        root: impl AsRef<Path>,
        collection: &str,
        namespace: &str,
    ) -> Result<Self> {
        let dir = root.as_ref().join(namespace).join(collection);
        fs::create_dir_all(&dir).await.map_err(|err| {
            WebloreError::BackendUnavailable(format!(
                "cannot create store directory {}: {err}",
                dir.display()
            ))
        })?;
        let store = Self {
            dir,
            namespace: namespace.to_string(),
            state: Mutex::new(State::default()),
        };
        {
            let mut state = store.state.lock().await;
            store.refresh(&mut state).await?;
            tracing::info!(
                dir = %store.dir.display(),
                documents = state.ids.len(),
                generation = state.generation,
                "local vector store opened"
            );
        }
        Ok(store)
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Reloads both artifacts when the on-disk generation differs from the
    /// loaded one. The pair must agree on its generation.
    async fn refresh(&self, state: &mut State) -> Result<()> {
        let manifest_path = self.path(MANIFEST_FILE);
        let manifest: Manifest = match fs::read(&manifest_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|err| WebloreError::store(format!("corrupt manifest: {err}")))?,
            // No manifest yet: nothing has been committed.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if manifest.generation == state.generation && state.generation != 0 {
            return Ok(());
        }

        let vector_bytes = fs::read(self.path(VECTORS_FILE)).await?;
        let meta_bytes = fs::read(self.path(META_FILE)).await?;
        let vectors: VectorArtifact = serde_json::from_slice(&vector_bytes)
            .map_err(|err| WebloreError::store(format!("corrupt vector artifact: {err}")))?;
        let meta: MetaArtifact = serde_json::from_slice(&meta_bytes)
            .map_err(|err| WebloreError::store(format!("corrupt metadata artifact: {err}")))?;

        if vectors.generation != meta.generation {
            return Err(WebloreError::store(format!(
                "artifact generations diverge (vectors {}, metadata {})",
                vectors.generation, meta.generation
            )));
        }
        if vectors.vectors.len() != meta.ids.len()
            || meta.ids.len() != meta.texts.len()
            || meta.texts.len() != meta.metadatas.len()
        {
            return Err(WebloreError::store(
                "vector index and metadata store are not index-aligned",
            ));
        }

        tracing::debug!(
            from = state.generation,
            to = vectors.generation,
            documents = meta.ids.len(),
            "reloading local store artifacts"
        );
        state.generation = vectors.generation;
        state.dimension = vectors.dimension;
        state.vectors = vectors.vectors;
        state.ids = meta.ids;
        state.texts = meta.texts;
        state.metadatas = meta.metadatas;
        Ok(())
    }

    /// Writes both artifacts and then the manifest; the manifest rename is
    /// the commit point.
    async fn persist(&self, state: &State) -> Result<()> {
        let vectors = VectorArtifact {
            generation: state.generation,
            dimension: state.dimension,
            vectors: state.vectors.clone(),
        };
        let meta = MetaArtifact {
            generation: state.generation,
            ids: state.ids.clone(),
            texts: state.texts.clone(),
            metadatas: state.metadatas.clone(),
        };
        write_atomic(&self.path(VECTORS_FILE), &encode(&vectors)?).await?;
        write_atomic(&self.path(META_FILE), &encode(&meta)?).await?;
        let manifest = Manifest {
            generation: state.generation,
        };
        write_atomic(&self.path(MANIFEST_FILE), &encode(&manifest)?).await?;
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(WebloreError::store)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait::async_trait]
impl VectorBackend for LocalVectorStore {
    #[tracing::instrument(skip_all, fields(chunks = chunks.len(), namespace = %self.namespace))]
    async fn store_documents(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let mut state = self.state.lock().await;
        // Pick up writes committed by other handles before appending.
        self.refresh(&mut state).await?;

        let documents = build_documents(chunks, embeddings, &self.namespace, state.ids.len())?;
        if documents.is_empty() {
            return Ok(());
        }

        let incoming_dim = documents[0].vector.len();
        if state.dimension == 0 {
            state.dimension = incoming_dim;
        } else if state.dimension != incoming_dim {
            return Err(WebloreError::store(format!(
                "embedding dimension {incoming_dim} does not match index dimension {}",
                state.dimension
            )));
        }

        let stored = documents.len();
        for doc in documents {
            state.vectors.push(doc.vector);
            state.ids.push(doc.id);
            state.texts.push(doc.text);
            state.metadatas.push(doc.metadata);
        }
        state.generation += 1;
        self.persist(&state).await?;
        tracing::info!(stored, generation = state.generation, "documents stored");
        Ok(())
    }

    async fn search_similar(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut state = self.state.lock().await;
        // Another process may have appended since the last load.
        self.refresh(&mut state).await?;

        if state.vectors.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let query = normalize(query_embedding);
        let mut scored: Vec<(usize, f32)> = state
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vector)| (idx, dot(&query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(idx, similarity)| SearchHit {
                text: state.texts[idx].clone(),
                metadata: state.metadatas[idx].clone(),
                similarity,
            })
            .collect())
    }

    async fn get_stats(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        self.refresh(&mut state).await?;
        Ok(state.ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn chunk(url: &str, index: usize, content: &str) -> Chunk {
        Chunk {
            url: url.to_string(),
            title: "Title".into(),
            content: content.to_string(),
            chunk_index: index,
            crawled_at: Utc::now(),
        }
    }

    async fn open(dir: &Path, namespace: &str) -> LocalVectorStore {
        LocalVectorStore::open(dir, "web_content", namespace)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn roundtrip_returns_own_document_first() {
        let dir = tempdir().unwrap();
        let store = open(dir.path(), "default").await;

        let chunks = vec![
            chunk("https://a", 0, "alpha"),
            chunk("https://a", 1, "beta"),
        ];
        let embeddings = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        store.store_documents(&chunks, &embeddings).await.unwrap();

        let hits = store.search_similar(&[0.0, 2.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "beta");
        assert!((hits[0].similarity - 1.0).abs() < 1e-5);
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = open(dir.path(), "default").await;
            store
                .store_documents(&[chunk("https://a", 0, "persisted")], &[vec![1.0, 0.0]])
                .await
                .unwrap();
        }
        let store = open(dir.path(), "default").await;
        assert_eq!(store.get_stats().await.unwrap(), 1);
        let hits = store.search_similar(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].text, "persisted");
    }

    #[tokio::test]
    async fn second_handle_sees_new_generation_before_search() {
        let dir = tempdir().unwrap();
        let writer = open(dir.path(), "default").await;
        let reader = open(dir.path(), "default").await;

        assert!(reader.search_similar(&[1.0, 0.0], 3).await.unwrap().is_empty());

        writer
            .store_documents(&[chunk("https://a", 0, "fresh")], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        // The reader handle was opened before the write; freshness check
        // must reload both artifacts.
        let hits = reader.search_similar(&[1.0, 0.0], 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "fresh");
        assert_eq!(reader.get_stats().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let dir = tempdir().unwrap();
        let store_a = open(dir.path(), "tenant-a").await;
        let store_b = open(dir.path(), "tenant-b").await;

        store_a
            .store_documents(&[chunk("https://a", 0, "private")], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        assert!(store_b.search_similar(&[1.0, 0.0], 5).await.unwrap().is_empty());
        assert_eq!(store_b.get_stats().await.unwrap(), 0);
        assert_eq!(store_a.get_stats().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_dimension_drift() {
        let dir = tempdir().unwrap();
        let store = open(dir.path(), "default").await;
        store
            .store_documents(&[chunk("https://a", 0, "three")], &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap();
        let err = store
            .store_documents(&[chunk("https://a", 1, "two")], &[vec![1.0, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, WebloreError::Store(_)));
    }

    #[tokio::test]
    async fn fewer_documents_than_top_k_returns_all() {
        let dir = tempdir().unwrap();
        let store = open(dir.path(), "default").await;
        store
            .store_documents(&[chunk("https://a", 0, "only")], &[vec![0.5, 0.5]])
            .await
            .unwrap();
        let hits = store.search_similar(&[0.5, 0.5], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn mixed_generation_artifacts_are_refused() {
        let dir = tempdir().unwrap();
        let store = open(dir.path(), "default").await;
        store
            .store_documents(&[chunk("https://a", 0, "v1")], &[vec![1.0, 0.0]])
            .await
            .unwrap();

        // Simulate a torn write: bump the metadata artifact's generation
        // without touching the vector artifact, then force a reload.
        let meta_path = dir
            .path()
            .join("default")
            .join("web_content")
            .join(META_FILE);
        let mut meta: MetaArtifact =
            serde_json::from_slice(&std::fs::read(&meta_path).unwrap()).unwrap();
        meta.generation += 5;
        std::fs::write(&meta_path, serde_json::to_vec(&meta).unwrap()).unwrap();
        let manifest_path = dir
            .path()
            .join("default")
            .join("web_content")
            .join(MANIFEST_FILE);
        std::fs::write(
            &manifest_path,
            serde_json::to_vec(&Manifest {
                generation: meta.generation,
            })
            .unwrap(),
        )
        .unwrap();

        let err = store.search_similar(&[1.0, 0.0], 1).await;
        assert!(err.is_err());
    }
}
