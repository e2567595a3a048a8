// Merged, immutable SID index (path <-> SID, parent/delta, identities).
//
// Sources are collected first and relationships are computed only after all
// of them are merged, because a node's structural parent may be declared in
// a different SID file (augments). Once built the index is read-only and can
// be shared across threads.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::SchemaError;

use super::catalog::{Catalog, TypeDescriptor};
use super::path;
use super::sid_file::{Namespace, SidFile};

/// One data node of the merged schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub sid: u64,
    /// Identifier as declared in the SID file.
    pub prefixed_path: String,
    /// Identifier with every module prefix removed.
    pub stripped_path: String,
    /// Nearest ancestor that has a SID.
    pub parent_sid: Option<u64>,
    /// `sid - parent_sid`; absent when the node has no known parent.
    pub delta: Option<i64>,
    pub local_name: String,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SchemaIndexBuilder {
    files: Vec<SidFile>,
    catalog: Catalog,
}

impl SchemaIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sid_file(&mut self, file: SidFile) -> &mut Self {
        self.files.push(file);
        self
    }

    pub fn sid_file(mut self, file: SidFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn set_catalog(&mut self, catalog: Catalog) -> &mut Self {
        self.catalog = catalog;
        self
    }

    pub fn build(self) -> SchemaIndex {
        let mut index = SchemaIndex {
            catalog: self.catalog,
            ..SchemaIndex::default()
        };

        // Pass 1: collect entries from every source.
        for file in &self.files {
            for item in &file.items {
                match item.namespace {
                    Namespace::Data => index.insert_path(item.sid, &item.identifier),
                    Namespace::Identity => index.insert_identity(item.sid, &item.identifier),
                    Namespace::Module => {
                        index.modules.insert(item.identifier.clone(), item.sid);
                    }
                    Namespace::Feature | Namespace::Other => {}
                }
            }
        }

        // Pass 2: parents and deltas over the merged set.
        for i in 0..index.entries.len() {
            let parent = index.find_parent(&index.entries[i].stripped_path);
            let entry = &mut index.entries[i];
            entry.parent_sid = parent;
            entry.delta = parent.map(|p| entry.sid as i64 - p as i64);
        }

        // Pass 3: declared child order.
        for i in 0..index.entries.len() {
            let (sid, parent) = (index.entries[i].sid, index.entries[i].parent_sid);
            if let Some(p) = parent {
                let siblings = index.children.entry(p).or_default();
                index.child_rank.insert(sid, siblings.len());
                siblings.push(sid);
            }
        }

        debug!(
            "schema index: {} data nodes, {} identities, {} modules",
            index.entries.len(),
            index.identity_by_sid.len(),
            index.modules.len()
        );
        index
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    entries: Vec<PathEntry>,
    by_sid: HashMap<u64, usize>,
    by_path: HashMap<String, usize>,
    /// Stripped local name -> entries, in declaration order.
    by_local: HashMap<String, Vec<usize>>,
    children: HashMap<u64, Vec<u64>>,
    child_rank: HashMap<u64, usize>,
    identity_by_name: HashMap<String, u64>,
    identity_by_sid: HashMap<u64, String>,
    identity_by_local: HashMap<String, Vec<u64>>,
    modules: HashMap<String, u64>,
    catalog: Catalog,
}

impl SchemaIndex {
    pub fn builder() -> SchemaIndexBuilder {
        SchemaIndexBuilder::new()
    }

    fn insert_path(&mut self, sid: u64, identifier: &str) {
        let stripped = path::strip_prefixes(identifier);
        if self.by_sid.contains_key(&sid) {
            warn!("SID {sid} assigned twice; keeping the first assignment, ignoring '{identifier}'");
            return;
        }
        if let Some(&existing) = self.by_path.get(&stripped) {
            warn!(
                "schema path '{stripped}' declared by SID {} and {sid}; keeping the first",
                self.entries[existing].sid
            );
            return;
        }
        let idx = self.entries.len();
        let local_name = path::last_local(&stripped).to_string();
        self.entries.push(PathEntry {
            sid,
            prefixed_path: identifier.to_string(),
            stripped_path: stripped.clone(),
            parent_sid: None,
            delta: None,
            local_name: local_name.clone(),
        });
        self.by_sid.insert(sid, idx);
        self.by_path.insert(stripped, idx);
        self.by_local.entry(local_name).or_default().push(idx);
    }

    fn insert_identity(&mut self, sid: u64, identifier: &str) {
        self.identity_by_name.insert(identifier.to_string(), sid);
        self.identity_by_sid
            .entry(sid)
            .or_insert_with(|| identifier.to_string());
        self.identity_by_local
            .entry(path::local_name(identifier).to_string())
            .or_default()
            .push(sid);
    }

    fn find_parent(&self, stripped_path: &str) -> Option<u64> {
        let mut current = path::parent_path(stripped_path);
        while let Some(p) = current {
            if let Some(&idx) = self.by_path.get(p) {
                return Some(self.entries[idx].sid);
            }
            current = path::parent_path(p);
        }
        None
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn entries(&self) -> &[PathEntry] {
        &self.entries
    }

    pub fn entry(&self, sid: u64) -> Option<&PathEntry> {
        self.by_sid.get(&sid).map(|&i| &self.entries[i])
    }

    /// Entry for a prefixed or stripped schema path.
    pub fn entry_by_path(&self, schema_path: &str) -> Option<&PathEntry> {
        self.by_path
            .get(&path::strip_prefixes(schema_path))
            .map(|&i| &self.entries[i])
    }

    pub fn sid_of(&self, schema_path: &str) -> Option<u64> {
        self.entry_by_path(schema_path).map(|e| e.sid)
    }

    pub fn contains_sid(&self, sid: u64) -> bool {
        self.by_sid.contains_key(&sid)
    }

    pub fn parent_of(&self, sid: u64) -> Option<u64> {
        self.entry(sid).and_then(|e| e.parent_sid)
    }

    /// `(parent_sid, delta)` for a schema path, or `None` when the node has no
    /// ancestor with a known SID and must be encoded absolutely.
    pub fn parent_delta_of(&self, schema_path: &str) -> Option<(u64, i64)> {
        let entry = self.entry_by_path(schema_path)?;
        Some((entry.parent_sid?, entry.delta?))
    }

    /// Children of `sid` in declaration order.
    pub fn children(&self, sid: u64) -> &[u64] {
        self.children.get(&sid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Position of `sid` among its parent's declared children.
    pub fn child_rank(&self, sid: u64) -> Option<usize> {
        self.child_rank.get(&sid).copied()
    }

    pub fn module_sid(&self, module: &str) -> Option<u64> {
        self.modules.get(module).copied()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Type descriptor registered for the node `sid`.
    pub fn type_of(&self, sid: u64) -> Option<&TypeDescriptor> {
        self.entry(sid)
            .and_then(|e| self.catalog.type_of(&e.stripped_path))
    }

    pub fn type_at(&self, schema_path: &str) -> Option<&TypeDescriptor> {
        self.catalog.type_of(&path::strip_prefixes(schema_path))
    }

    /// Key leaf names of the list `sid`: from the catalog when present,
    /// otherwise the first `count` declared children.
    pub fn key_names(&self, sid: u64, count: usize) -> Vec<String> {
        if let Some(entry) = self.entry(sid)
            && let Some(keys) = self.catalog.keys_of(&entry.stripped_path)
        {
            return keys.to_vec();
        }
        self.children(sid)
            .iter()
            .take(count)
            .filter_map(|c| self.entry(*c).map(|e| e.local_name.clone()))
            .collect()
    }

    /// Key names declared in the catalog for `sid`, if it is a known list.
    pub fn declared_keys(&self, sid: u64) -> Option<&[String]> {
        let entry = self.entry(sid)?;
        self.catalog.keys_of(&entry.stripped_path)
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve `local_key` (optionally module-prefixed) under `context_path`.
    ///
    /// Tries the exact path `context_path/local_key` first. Otherwise falls back
    /// to every node whose last segment is `local_key`: a single candidate wins
    /// outright, several are scored by how many leading segments they share
    /// with `context_path` (first declared wins ties). The fallback covers
    /// choice/case branches that are implicit in the data.
    pub fn resolve(&self, local_key: &str, context_path: &str) -> Result<u64, SchemaError> {
        self.resolve_entry(local_key, context_path).map(|e| e.sid)
    }

    pub fn resolve_entry(
        &self,
        local_key: &str,
        context_path: &str,
    ) -> Result<&PathEntry, SchemaError> {
        let context = path::strip_prefixes(context_path);
        let exact = path::join(&context, local_key);
        if let Some(&idx) = self.by_path.get(&exact) {
            return Ok(&self.entries[idx]);
        }

        let name = path::local_name(local_key);
        let unknown = || SchemaError::UnknownNode {
            name: local_key.to_string(),
            context: context.clone(),
        };
        let candidates = self.by_local.get(name).ok_or_else(unknown)?;
        let best = match candidates.as_slice() {
            [] => return Err(unknown()),
            [only] => *only,
            many => {
                let mut best = many[0];
                let mut best_score = path::common_prefix_len(&self.entries[best].stripped_path, &context);
                for &idx in &many[1..] {
                    let score = path::common_prefix_len(&self.entries[idx].stripped_path, &context);
                    if score > best_score {
                        best = idx;
                        best_score = score;
                    }
                }
                best
            }
        };
        let entry = &self.entries[best];
        debug!(
            "resolved '{local_key}' under '{context}' by name match to {} ({})",
            entry.sid, entry.stripped_path
        );
        Ok(entry)
    }

    /// SID of an identity, by full (`module:name`) or bare name.
    pub fn identity_sid(&self, name: &str) -> Result<u64, SchemaError> {
        if let Some(&sid) = self.identity_by_name.get(name) {
            return Ok(sid);
        }
        self.identity_by_local
            .get(path::local_name(name))
            .and_then(|sids| sids.first().copied())
            .ok_or_else(|| SchemaError::UnknownIdentity(name.to_string()))
    }

    pub fn identity_name(&self, sid: u64) -> Result<&str, SchemaError> {
        self.identity_by_sid
            .get(&sid)
            .map(String::as_str)
            .ok_or(SchemaError::UnknownIdentitySid(sid))
    }
}
