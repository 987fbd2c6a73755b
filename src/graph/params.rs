//! Local parameters attached to nodes and graphs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::graph::GraphId;

/// Integer and blob parameters keyed by `i32`.
///
/// Ordered maps keep iteration, and with it `describe()` output, deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalParams {
    #[serde(default)]
    ints: BTreeMap<i32, i64>,
    #[serde(default)]
    blobs: BTreeMap<i32, Vec<u8>>,
}

impl LocalParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`LocalParams::set_int`].
    pub fn with_int(mut self, key: i32, value: i64) -> Self {
        self.set_int(key, value);
        self
    }

    /// Builder form of [`LocalParams::set_blob`].
    pub fn with_blob(mut self, key: i32, value: impl Into<Vec<u8>>) -> Self {
        self.set_blob(key, value);
        self
    }

    pub fn set_int(&mut self, key: i32, value: i64) {
        self.ints.insert(key, value);
    }

    pub fn set_blob(&mut self, key: i32, value: impl Into<Vec<u8>>) {
        self.blobs.insert(key, value.into());
    }

    pub fn int(&self, key: i32) -> Option<i64> {
        self.ints.get(&key).copied()
    }

    pub fn blob(&self, key: i32) -> Option<&[u8]> {
        self.blobs.get(&key).map(|b| b.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.ints.is_empty() && self.blobs.is_empty()
    }

    /// A copy of `self` with every entry of `overrides` applied on top.
    pub fn merged_with(&self, overrides: &LocalParams) -> LocalParams {
        let mut merged = self.clone();
        merged
            .ints
            .extend(overrides.ints.iter().map(|(&k, &v)| (k, v)));
        merged
            .blobs
            .extend(overrides.blobs.iter().map(|(&k, v)| (k, v.clone())));
        merged
    }
}

/// Overrides applied when cloning a node.
#[derive(Debug, Clone, Default)]
pub struct NodeParameters {
    pub name: Option<String>,
    pub local_params: LocalParams,
}

/// Overrides applied when re-parameterizing a graph. Unset fields keep the
/// base graph's values.
#[derive(Debug, Clone, Default)]
pub struct GraphParameters {
    pub name: Option<String>,
    /// Replacement successors (static graphs), candidates (selectors) or
    /// custom graphs (function graphs).
    pub successors: Option<Vec<GraphId>>,
    pub local_params: Option<LocalParams>,
}
