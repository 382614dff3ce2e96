// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Data storage.
//!
//! ## Overview
//!
//! [`DataStorage`] owns a set of [`DataNode`](crate::node::DataNode)s, kept in insertion order,
//! and records which nodes each node was derived from. The derivation graph is acyclic by
//! construction: a node's sources must already be stored when it is added.
//!
//! Three signals report changes:
//!
//! - [`DataStorage::node_added`] after a node is stored,
//! - [`DataStorage::node_removed`] before a node is dropped from the storage,
//! - [`DataStorage::interactor_changed`] when a stored node's interactor changes.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::debug;
use understory_weak::Strong;

use crate::node::NodeHandle;
use crate::signal::{Signal, Subscription};

/// Rejected storage operation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The node is already stored.
    #[error("node `{node}` is already stored")]
    AlreadyPresent {
        /// Node name.
        node: String,
    },
    /// The node is not stored.
    #[error("node `{node}` is not stored")]
    NotPresent {
        /// Node name.
        node: String,
    },
    /// A source node given to [`DataStorage::add`] is not stored.
    #[error("source `{source_node}` of node `{node}` is not stored")]
    UnknownSource {
        /// Node being added.
        node: String,
        /// The missing source.
        source_node: String,
    },
}

struct Stored {
    sources: SmallVec<[NodeHandle; 2]>,
    _interactor_watch: Subscription,
}

/// An ordered set of nodes with derivation edges.
pub struct DataStorage {
    order: Vec<NodeHandle>,
    stored: HashMap<NodeHandle, Stored>,
    node_added: Signal<NodeHandle>,
    node_removed: Signal<NodeHandle>,
    interactor_changed: Signal<NodeHandle>,
}

impl DataStorage {
    /// An empty storage.
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            stored: HashMap::new(),
            node_added: Signal::new(),
            node_removed: Signal::new(),
            interactor_changed: Signal::new(),
        }
    }

    /// Store `node`, derived from `sources`.
    ///
    /// Every source must already be stored, which keeps the graph acyclic.
    pub fn add(&mut self, node: NodeHandle, sources: &[NodeHandle]) -> Result<(), StorageError> {
        if self.stored.contains_key(&node) {
            return Err(StorageError::AlreadyPresent {
                node: node.name().into(),
            });
        }
        if let Some(missing) = sources.iter().find(|s| !self.stored.contains_key(*s)) {
            return Err(StorageError::UnknownSource {
                node: node.name().into(),
                source_node: missing.name().into(),
            });
        }

        let signal = self.interactor_changed.clone();
        let watched = Strong::downgrade(&node);
        let watch = node.interactor_changed().subscribe(move |()| {
            if let Some(node) = watched.lock() {
                signal.emit(&node);
            }
        });
        self.stored.insert(
            node.clone(),
            Stored {
                sources: sources.iter().cloned().collect(),
                _interactor_watch: watch,
            },
        );
        self.order.push(node.clone());
        debug!(node = %node.name(), sources = sources.len(), "node stored");
        self.node_added.emit(&node);
        Ok(())
    }

    /// Remove `node`. Nodes derived from it stay stored and lose the edge.
    pub fn remove(&mut self, node: &NodeHandle) -> Result<(), StorageError> {
        if !self.stored.contains_key(node) {
            return Err(StorageError::NotPresent {
                node: node.name().into(),
            });
        }
        self.node_removed.emit(node);

        let removed = self.stored.remove(node);
        self.order.retain(|n| !Strong::ptr_eq(n, node));
        for stored in self.stored.values_mut() {
            stored.sources.retain(|s| !Strong::ptr_eq(s, node));
        }
        drop(removed);
        debug!(node = %node.name(), "node removed");
        Ok(())
    }

    /// Whether `node` is stored.
    pub fn contains(&self, node: &NodeHandle) -> bool {
        self.stored.contains_key(node)
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stored nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeHandle> + '_ {
        self.order.iter()
    }

    /// First stored node named `name`.
    pub fn find(&self, name: &str) -> Option<&NodeHandle> {
        self.order.iter().find(|n| n.name() == name)
    }

    /// Nodes `node` was directly derived from.
    pub fn sources(&self, node: &NodeHandle) -> Vec<NodeHandle> {
        self.stored
            .get(node)
            .map(|s| s.sources.to_vec())
            .unwrap_or_default()
    }

    /// Nodes directly derived from `node`, in insertion order.
    pub fn derivations(&self, node: &NodeHandle) -> Vec<NodeHandle> {
        self.order
            .iter()
            .filter(|n| {
                self.stored
                    .get(*n)
                    .is_some_and(|s| s.sources.iter().any(|src| Strong::ptr_eq(src, node)))
            })
            .cloned()
            .collect()
    }

    /// Emitted after a node is stored.
    pub fn node_added(&self) -> &Signal<NodeHandle> {
        &self.node_added
    }

    /// Emitted before a node leaves the storage.
    pub fn node_removed(&self) -> &Signal<NodeHandle> {
        &self.node_removed
    }

    /// Emitted when a stored node's interactor is attached, detached, or replaced.
    pub fn interactor_changed(&self) -> &Signal<NodeHandle> {
        &self.interactor_changed
    }
}

impl Default for DataStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStorage")
            .field("nodes", &self.order.len())
            .finish_non_exhaustive()
    }
}
