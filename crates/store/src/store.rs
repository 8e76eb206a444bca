//! `PromptStore`: the durable prompt graph.
//!
//! Layout under the store root:
//! - `prompts.graph`: topology (see [`crate::graph`])
//! - `prompts.db`: sealed prompt records (see [`crate::blob`])
//!
//! A single writer per root is assumed.

use crate::blob::BlobStore;
use crate::graph::{self, Node, PromptGraph};
use std::path::{Path, PathBuf};
use threadline_core::error::StoreError;
use threadline_core::prompt::SealedPrompt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const GRAPH_FILE: &str = "prompts.graph";
pub const DB_FILE: &str = "prompts.db";

/// A topic root with the newest activity anywhere beneath it.
#[derive(Debug, Clone)]
pub struct TopicSummary {
    pub root: SealedPrompt,
    pub latest_time: i64,
    pub hidden: bool,
}

pub struct PromptStore {
    root: PathBuf,
    graph_path: PathBuf,
    graph: RwLock<PromptGraph>,
    blobs: BlobStore,
}

impl PromptStore {
    /// Open the store at `root`, creating it if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StoreError::Storage(format!("Failed to create {}: {e}", root.display()))
        })?;

        let graph_path = root.join(GRAPH_FILE);
        let graph = PromptGraph::load(&graph_path)?;
        let blobs = BlobStore::open(&root.join(DB_FILE)).await?;

        info!(
            root = %root.display(),
            prompts = graph.len(),
            "Prompt store opened"
        );
        Ok(Self {
            root,
            graph_path,
            graph: RwLock::new(graph),
            blobs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a sealed prompt.
    ///
    /// A new hash gets a node plus parent and reference edges; every target
    /// must already be stored. Re-storing a known hash only rewrites its
    /// record.
    pub async fn store_prompt(&self, prompt: &SealedPrompt) -> Result<(), StoreError> {
        let mut graph = self.graph.write().await;

        let mut next = graph.clone();
        let added = next.insert(
            prompt.hash(),
            prompt.timestamp(),
            prompt.parent(),
            prompt.references(),
        )?;

        self.blobs.put(prompt).await?;
        if !added {
            debug!(hash = %prompt.hash(), "Prompt already stored, record rewritten");
            return Ok(());
        }

        if let Err(e) = next.save(&self.graph_path) {
            if let Err(cleanup) = self.blobs.delete(prompt.hash()).await {
                warn!(hash = %prompt.hash(), error = %cleanup, "Failed to roll back prompt record");
            }
            return Err(e);
        }
        *graph = next;

        debug!(
            hash = %prompt.hash(),
            parent = ?prompt.parent(),
            references = prompt.references().len(),
            "Stored prompt"
        );
        Ok(())
    }

    /// Load a prompt by hash, verifying its content against the hash.
    pub async fn get_prompt(&self, hash: &str) -> Result<SealedPrompt, StoreError> {
        if !self.graph.read().await.contains(hash) {
            return Err(StoreError::NotFound(hash.to_string()));
        }
        self.load_record(hash).await
    }

    async fn load_record(&self, hash: &str) -> Result<SealedPrompt, StoreError> {
        let prompt = self
            .blobs
            .get(hash)
            .await?
            .ok_or_else(|| StoreError::Corrupt {
                path: self.root.join(DB_FILE).display().to_string(),
                reason: format!("record for {hash} is missing"),
            })?;
        if prompt.hash() != hash || !prompt.verify() {
            return Err(StoreError::Corrupt {
                path: self.root.join(DB_FILE).display().to_string(),
                reason: format!("record for {hash} does not match its hash"),
            });
        }
        Ok(prompt)
    }

    async fn load_all(&self, hashes: Vec<String>) -> Result<Vec<SealedPrompt>, StoreError> {
        let mut prompts = Vec::with_capacity(hashes.len());
        for hash in hashes {
            prompts.push(self.load_record(&hash).await?);
        }
        Ok(prompts)
    }

    /// Prompts newest first, sliced `[start, end)`.
    ///
    /// With `topic`, only that prompt and its parent-descendants are listed.
    pub async fn select_prompts(
        &self,
        start: usize,
        end: usize,
        topic: Option<&str>,
    ) -> Result<Vec<SealedPrompt>, StoreError> {
        let hashes = {
            let graph = self.graph.read().await;
            let mut nodes: Vec<&Node> = match topic {
                Some(root) => {
                    if !graph.contains(root) {
                        return Err(StoreError::NotFound(root.to_string()));
                    }
                    graph.descendants(root)
                }
                None => graph.nodes().collect(),
            };
            graph::sort_recent(&mut nodes);
            slice(&nodes, start, end)
        };
        self.load_all(hashes).await
    }

    /// Topic roots ordered by their most recent activity, sliced `[start, end)`.
    pub async fn select_topics(
        &self,
        start: usize,
        end: usize,
    ) -> Result<Vec<TopicSummary>, StoreError> {
        let picked: Vec<(String, i64, bool)> = {
            let graph = self.graph.read().await;
            let mut roots: Vec<(&Node, i64)> = graph
                .roots()
                .into_iter()
                .map(|n| (n, graph.latest_time(&n.hash)))
                .collect();
            roots.sort_by(|(a, at), (b, bt)| bt.cmp(at).then(b.seq.cmp(&a.seq)));
            let end = end.min(roots.len());
            roots
                .get(start.min(end)..end)
                .unwrap_or_default()
                .iter()
                .map(|(n, latest)| (n.hash.clone(), *latest, n.hidden))
                .collect()
        };

        let mut topics = Vec::with_capacity(picked.len());
        for (hash, latest_time, hidden) in picked {
            topics.push(TopicSummary {
                root: self.load_record(&hash).await?,
                latest_time,
                hidden,
            });
        }
        Ok(topics)
    }

    /// Delete a prompt that nothing depends on.
    ///
    /// Returns `Ok(false)` when the prompt has a child or is referenced.
    /// Once the graph is saved the delete has happened; a record that cannot
    /// be removed afterwards is only logged.
    pub async fn delete_prompt(&self, hash: &str) -> Result<bool, StoreError> {
        let mut graph = self.graph.write().await;
        let mut next = graph.clone();
        if !next.remove(hash)? {
            debug!(hash, "Prompt has dependents, not deleted");
            return Ok(false);
        }
        next.save(&self.graph_path)?;
        *graph = next;
        match self.blobs.delete(hash).await {
            Ok(true) => {}
            Ok(false) => warn!(hash, "Deleted prompt had no stored record"),
            Err(e) => warn!(hash, error = %e, "Failed to delete prompt record, left orphaned"),
        }
        debug!(hash, "Deleted prompt");
        Ok(true)
    }

    /// Hide or unhide a topic root in topic listings.
    pub async fn set_topic_hidden(&self, root: &str, hidden: bool) -> Result<(), StoreError> {
        let mut graph = self.graph.write().await;
        let mut next = graph.clone();
        next.set_hidden(root, hidden)?;
        next.save(&self.graph_path)?;
        *graph = next;
        debug!(root, hidden, "Topic visibility changed");
        Ok(())
    }

    pub async fn contains(&self, hash: &str) -> bool {
        self.graph.read().await.contains(hash)
    }

    pub async fn len(&self) -> usize {
        self.graph.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.graph.read().await.is_empty()
    }

    /// The parent chain of `hash`, nearest first.
    pub async fn ancestors(&self, hash: &str) -> Result<Vec<String>, StoreError> {
        let graph = self.graph.read().await;
        if !graph.contains(hash) {
            return Err(StoreError::NotFound(hash.to_string()));
        }
        Ok(graph.ancestors(hash))
    }
}

fn slice(nodes: &[&Node], start: usize, end: usize) -> Vec<String> {
    let end = end.min(nodes.len());
    nodes
        .get(start.min(end)..end)
        .unwrap_or_default()
        .iter()
        .map(|n| n.hash.clone())
        .collect()
}
