//! Narrower-than relation over interpretation and manifestation URIs.
//!
//! The taxonomy is supplied by the environment (ontology data is not part of
//! this crate) and never edited by the log. Lookups expand a URI into itself
//! plus every transitively narrower URI.

use std::{
  collections::{BTreeMap, BTreeSet},
  path::Path,
};

use serde::{Deserialize, Serialize};

use crate::Result;

/// On-disk form: each entry names a URI and the broader URIs it refines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyFile {
  #[serde(default)]
  pub symbols: Vec<SymbolEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolEntry {
  pub uri:     String,
  #[serde(default)]
  pub parents: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
  children: BTreeMap<String, BTreeSet<String>>,
}

impl Taxonomy {
  pub fn new() -> Self { Self::default() }

  /// Build from `(narrower, broader)` pairs.
  pub fn from_edges<I, A, B>(edges: I) -> Self
  where
    I: IntoIterator<Item = (A, B)>,
    A: Into<String>,
    B: Into<String>,
  {
    let mut taxonomy = Self::new();
    for (child, parent) in edges {
      taxonomy.add(child, parent);
    }
    taxonomy
  }

  /// Record that `child` is narrower than `parent`.
  pub fn add(&mut self, child: impl Into<String>, parent: impl Into<String>) {
    self
      .children
      .entry(parent.into())
      .or_default()
      .insert(child.into());
  }

  /// Load a JSON [`TaxonomyFile`].
  pub fn load(path: &Path) -> Result<Self> {
    let raw = std::fs::read_to_string(path)?;
    let file: TaxonomyFile = serde_json::from_str(&raw)?;
    let mut taxonomy = Self::new();
    for entry in file.symbols {
      for parent in entry.parents {
        taxonomy.add(entry.uri.clone(), parent);
      }
    }
    tracing::debug!(path = %path.display(), roots = taxonomy.children.len(), "taxonomy loaded");
    Ok(taxonomy)
  }

  /// `uri` followed by all of its descendants, each listed once.
  ///
  /// Cycles in the source data are broken at the first revisit and logged.
  pub fn expand(&self, uri: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let mut stack = vec![uri.to_string()];
    while let Some(next) = stack.pop() {
      if !seen.insert(next.clone()) {
        continue;
      }
      if let Some(children) = self.children.get(&next) {
        for child in children.iter().rev() {
          if child == uri || (seen.contains(child) && self.reaches(child, &next)) {
            tracing::warn!(%child, parent = %next, "taxonomy cycle ignored");
            continue;
          }
          stack.push(child.clone());
        }
      }
      out.push(next);
    }
    out
  }

  /// Whether `from` can reach `to` through narrower-than edges.
  fn reaches(&self, from: &str, to: &str) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack = vec![from];
    while let Some(next) = stack.pop() {
      if next == to {
        return true;
      }
      if !seen.insert(next) {
        continue;
      }
      if let Some(children) = self.children.get(next) {
        stack.extend(children.iter().map(String::as_str));
      }
    }
    false
  }

  /// Whether `candidate` equals `uri` or is narrower than it.
  pub fn is_a(&self, candidate: &str, uri: &str) -> bool {
    candidate == uri || self.expand(uri).iter().any(|u| u == candidate)
  }
}
