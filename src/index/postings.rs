//! Inverted indexes: token → set of trajectory ids
//!
//! Postings are Roaring Bitmaps. Snapshots are bincode-encoded with the
//! bitmaps flattened to sorted `Vec<u32>`, tagged with the index kind so an
//! edge snapshot can't be loaded as a vertex snapshot by mistake.

use crate::storage::snapshot;
use crate::storage::TrajectoryStore;
use crate::types::{Token, TrajectoryId};
use crate::{EngineError, Result};
use ahash::AHashMap;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingsKind {
    Edge,
    Vertex,
}

#[derive(Serialize, Deserialize)]
struct PostingsSnapshot {
    kind: PostingsKind,
    entries: Vec<(Token, Vec<u32>)>,
}

/// Shared postings table
#[derive(Debug)]
pub struct Postings {
    kind: PostingsKind,
    lists: AHashMap<Token, RoaringBitmap>,
}

impl Postings {
    fn new(kind: PostingsKind) -> Self {
        Self { kind, lists: AHashMap::new() }
    }

    fn add(&mut self, token: Token, id: TrajectoryId) {
        self.lists.entry(token).or_default().insert(id);
    }

    fn load(path: &Path, kind: PostingsKind) -> Result<Self> {
        let snapshot: PostingsSnapshot = snapshot::read_binary(path)?;
        if snapshot.kind != kind {
            return Err(EngineError::Corruption(format!(
                "{}: expected {:?} postings, found {:?}",
                path.display(),
                kind,
                snapshot.kind
            )));
        }
        let lists = snapshot
            .entries
            .into_iter()
            .map(|(token, ids)| (token, RoaringBitmap::from_iter(ids)))
            .collect();
        Ok(Self { kind, lists })
    }

    fn save(&self, path: &Path) -> Result<()> {
        let mut entries: Vec<(Token, Vec<u32>)> = self
            .lists
            .iter()
            .map(|(token, ids)| (*token, ids.iter().collect()))
            .collect();
        entries.sort_unstable_by_key(|(token, _)| *token);
        snapshot::write_binary(path, &PostingsSnapshot { kind: self.kind, entries })
    }

    pub fn kind(&self) -> PostingsKind {
        self.kind
    }

    pub fn get(&self, token: Token) -> Option<&RoaringBitmap> {
        self.lists.get(&token)
    }

    /// Ids present under every token; empty for an empty token list
    pub fn intersection(&self, tokens: &[Token]) -> RoaringBitmap {
        let mut lists = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.get(*token) {
                Some(list) => lists.push(list),
                None => return RoaringBitmap::new(),
            }
        }
        // smallest first keeps intermediate results small
        lists.sort_unstable_by_key(|list| list.len());

        let mut iter = lists.into_iter();
        let mut acc = match iter.next() {
            Some(first) => first.clone(),
            None => return RoaringBitmap::new(),
        };
        for list in iter {
            acc &= list;
            if acc.is_empty() {
                break;
            }
        }
        acc
    }

    /// Ids present under any token
    pub fn union<'a, I>(&self, tokens: I) -> RoaringBitmap
    where
        I: IntoIterator<Item = &'a Token>,
    {
        let mut acc = RoaringBitmap::new();
        for token in tokens {
            if let Some(list) = self.get(*token) {
                acc |= list;
            }
        }
        acc
    }

    /// Number of distinct tokens
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Approximate heap footprint in bytes
    pub fn memory_usage(&self) -> usize {
        self.lists
            .values()
            .map(|list| list.serialized_size() + std::mem::size_of::<(Token, RoaringBitmap)>())
            .sum()
    }
}

/// Edge token → trajectories traversing that edge
#[derive(Debug)]
pub struct EdgeInvertedIndex(Postings);

impl EdgeInvertedIndex {
    /// Load a persisted snapshot
    pub fn build(path: &Path) -> Result<Self> {
        Postings::load(path, PostingsKind::Edge).map(Self)
    }

    pub fn from_store(store: &TrajectoryStore) -> Self {
        let mut postings = Postings::new(PostingsKind::Edge);
        for (id, edges) in store.iter() {
            for edge in edges {
                postings.add(*edge, id);
            }
        }
        Self(postings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.0.save(path)
    }
}

impl Deref for EdgeInvertedIndex {
    type Target = Postings;

    fn deref(&self) -> &Postings {
        &self.0
    }
}

/// Vertex token → trajectories passing through that vertex
#[derive(Debug)]
pub struct VertexInvertedIndex(Postings);

impl VertexInvertedIndex {
    /// Load a persisted snapshot
    pub fn build(path: &Path) -> Result<Self> {
        Postings::load(path, PostingsKind::Vertex).map(Self)
    }

    pub fn from_vertex_paths<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = (TrajectoryId, &'a [Token])>,
    {
        let mut postings = Postings::new(PostingsKind::Vertex);
        for (id, vertices) in paths {
            for vertex in vertices {
                postings.add(*vertex, id);
            }
        }
        Self(postings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.0.save(path)
    }
}

impl Deref for VertexInvertedIndex {
    type Target = Postings;

    fn deref(&self) -> &Postings {
        &self.0
    }
}
