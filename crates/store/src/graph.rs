//! The prompt graph: nodes are prompt hashes, edges point from a child to
//! its parent and to each prompt it references.
//!
//! Persisted as `prompts.graph`, a JSON node-link document:
//!
//! ```json
//! {"version": 1,
//!  "nodes": [{"hash": "…", "timestamp": 1700000000, "seq": 0, "hidden": false}],
//!  "edges": [{"source": "child", "target": "parent", "kind": "parent"}]}
//! ```
//!
//! The parent relation forms a forest: every node has at most one parent and
//! a parentless node is a topic root. Reference edges never change which
//! node is a root.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use threadline_core::error::StoreError;

const GRAPH_VERSION: u32 = 1;

/// A prompt in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub hash: String,
    /// Unix seconds
    pub timestamp: i64,
    /// Insertion order; breaks timestamp ties (later insert sorts as newer)
    pub seq: u64,
    /// Only meaningful on topic roots
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Parent,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<Edge>,
}

/// In-memory prompt graph with indexes in both edge directions.
#[derive(Debug, Clone, Default)]
pub struct PromptGraph {
    nodes: HashMap<String, Node>,
    /// child → parent
    parents: HashMap<String, String>,
    /// parent → children
    children: HashMap<String, BTreeSet<String>>,
    /// source → referenced prompts
    references: HashMap<String, BTreeSet<String>>,
    /// referenced prompt → sources
    referrers: HashMap<String, BTreeSet<String>>,
    next_seq: u64,
}

fn corrupt(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

impl PromptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the graph file at `path`; a missing file is an empty graph.
    ///
    /// Anything unreadable, or a document that breaks the graph's invariants,
    /// is reported as `Corrupt`.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| corrupt(path, format!("unreadable: {e}")))?;
        let document: GraphDocument =
            serde_json::from_str(&content).map_err(|e| corrupt(path, e.to_string()))?;
        if document.version > GRAPH_VERSION {
            return Err(corrupt(
                path,
                format!("unsupported graph version {}", document.version),
            ));
        }
        Self::from_document(document).map_err(|reason| corrupt(path, reason))
    }

    fn from_document(document: GraphDocument) -> Result<Self, String> {
        let mut graph = Self::new();
        for node in document.nodes {
            graph.next_seq = graph.next_seq.max(node.seq + 1);
            if graph.nodes.insert(node.hash.clone(), node).is_some() {
                return Err("duplicate node".into());
            }
        }
        for edge in document.edges {
            if !graph.nodes.contains_key(&edge.source) || !graph.nodes.contains_key(&edge.target) {
                return Err(format!(
                    "dangling edge {} -> {}",
                    edge.source, edge.target
                ));
            }
            match edge.kind {
                EdgeKind::Parent => {
                    if graph.parents.contains_key(&edge.source) {
                        return Err(format!("{} has more than one parent", edge.source));
                    }
                    graph.link_parent(&edge.source, &edge.target);
                }
                EdgeKind::Reference => graph.link_reference(&edge.source, &edge.target),
            }
        }
        for hash in graph.nodes.keys() {
            if graph.ancestors(hash).len() >= graph.nodes.len() {
                return Err(format!("parent cycle through {hash}"));
            }
        }
        Ok(graph)
    }

    fn to_document(&self) -> GraphDocument {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| n.seq);

        let mut edges: Vec<Edge> = self
            .parents
            .iter()
            .map(|(child, parent)| Edge {
                source: child.clone(),
                target: parent.clone(),
                kind: EdgeKind::Parent,
            })
            .chain(self.references.iter().flat_map(|(source, targets)| {
                targets.iter().map(move |target| Edge {
                    source: source.clone(),
                    target: target.clone(),
                    kind: EdgeKind::Reference,
                })
            }))
            .collect();
        edges.sort();

        GraphDocument {
            version: GRAPH_VERSION,
            nodes,
            edges,
        }
    }

    /// Write the graph to `path` via a temporary file and rename.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(&self.to_document())
            .map_err(|e| StoreError::Storage(format!("Failed to serialize graph: {e}")))?;
        let tmp = path.with_extension("graph.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| StoreError::Storage(format!("Failed to write graph file: {e}")))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| StoreError::Storage(format!("Failed to replace graph file: {e}")))?;
        Ok(())
    }

    fn link_parent(&mut self, child: &str, parent: &str) {
        self.parents.insert(child.to_string(), parent.to_string());
        self.children
            .entry(parent.to_string())
            .or_default()
            .insert(child.to_string());
    }

    fn link_reference(&mut self, source: &str, target: &str) {
        self.references
            .entry(source.to_string())
            .or_default()
            .insert(target.to_string());
        self.referrers
            .entry(target.to_string())
            .or_default()
            .insert(source.to_string());
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn node(&self, hash: &str) -> Option<&Node> {
        self.nodes.get(hash)
    }

    pub fn parent_of(&self, hash: &str) -> Option<&str> {
        self.parents.get(hash).map(String::as_str)
    }

    /// Add a node with its edges.
    ///
    /// Returns `Ok(false)` if the hash is already present; its edges are left
    /// as they are. Every edge target must already exist.
    pub fn insert(
        &mut self,
        hash: &str,
        timestamp: i64,
        parent: Option<&str>,
        references: &[String],
    ) -> Result<bool, StoreError> {
        if self.contains(hash) {
            return Ok(false);
        }
        for target in parent.into_iter().chain(references.iter().map(String::as_str)) {
            if !self.contains(target) {
                return Err(StoreError::DanglingReference {
                    hash: target.to_string(),
                });
            }
        }

        self.nodes.insert(
            hash.to_string(),
            Node {
                hash: hash.to_string(),
                timestamp,
                seq: self.next_seq,
                hidden: false,
            },
        );
        self.next_seq += 1;

        if let Some(parent) = parent {
            self.link_parent(hash, parent);
        }
        for target in references {
            self.link_reference(hash, target);
        }
        Ok(true)
    }

    /// A node can go only if nothing has it as parent or reference.
    pub fn is_deletable(&self, hash: &str) -> bool {
        self.contains(hash)
            && self.children.get(hash).is_none_or(BTreeSet::is_empty)
            && self.referrers.get(hash).is_none_or(BTreeSet::is_empty)
    }

    /// Remove a node and its outgoing edges. Never cascades.
    ///
    /// Returns `Ok(false)` when the node is a parent or a reference target.
    pub fn remove(&mut self, hash: &str) -> Result<bool, StoreError> {
        if !self.contains(hash) {
            return Err(StoreError::NotFound(hash.to_string()));
        }
        if !self.is_deletable(hash) {
            return Ok(false);
        }

        self.nodes.remove(hash);
        self.children.remove(hash);
        self.referrers.remove(hash);
        if let Some(parent) = self.parents.remove(hash) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.remove(hash);
            }
        }
        if let Some(targets) = self.references.remove(hash) {
            for target in targets {
                if let Some(sources) = self.referrers.get_mut(&target) {
                    sources.remove(hash);
                }
            }
        }
        Ok(true)
    }

    /// The parent chain of `hash`, nearest first.
    pub fn ancestors(&self, hash: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = hash;
        while let Some(parent) = self.parent_of(current) {
            if chain.len() > self.nodes.len() {
                break;
            }
            chain.push(parent.to_string());
            current = parent;
        }
        chain
    }

    /// The topic root `hash` belongs to.
    pub fn topic_root<'a>(&'a self, hash: &'a str) -> &'a str {
        let mut current = hash;
        let mut steps = 0;
        while let Some(parent) = self.parent_of(current) {
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
            current = parent;
        }
        current
    }

    /// `root` and every node below it along parent edges.
    pub fn descendants(&self, root: &str) -> Vec<&Node> {
        let mut found = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(hash) = queue.pop_front() {
            if let Some(node) = self.nodes.get(hash) {
                found.push(node);
            }
            if let Some(kids) = self.children.get(hash) {
                queue.extend(kids.iter().map(String::as_str));
            }
        }
        found
    }

    /// Nodes without a parent.
    pub fn roots(&self) -> Vec<&Node> {
        self.nodes
            .values()
            .filter(|n| !self.parents.contains_key(&n.hash))
            .collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Newest timestamp anywhere in the topic rooted at `root`.
    pub fn latest_time(&self, root: &str) -> i64 {
        self.descendants(root)
            .iter()
            .map(|n| n.timestamp)
            .max()
            .unwrap_or_default()
    }

    /// Mark a topic root hidden or visible.
    pub fn set_hidden(&mut self, root: &str, hidden: bool) -> Result<(), StoreError> {
        if self.parents.contains_key(root) {
            return Err(StoreError::NotTopicRoot(root.to_string()));
        }
        let node = self
            .nodes
            .get_mut(root)
            .ok_or_else(|| StoreError::NotFound(root.to_string()))?;
        node.hidden = hidden;
        Ok(())
    }
}

/// Sort newest first: timestamp descending, later insertion first on ties.
pub fn sort_recent(nodes: &mut [&Node]) {
    nodes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.seq.cmp(&a.seq)));
}
