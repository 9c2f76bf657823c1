/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! On-disk graph cache.
//!
//! Parsing a huge Matrix Market file dominates startup time, so the
//! coordinator persists the constructed [`Csr`] in ε-serde format next to
//! the input and restores it verbatim on later runs. The propagation core
//! is agnostic to whether its graph came from a fresh parse or from the
//! cache, and labels are never cached: they are identity-initialized on
//! every run.

use crate::graph::Csr;
use anyhow::{Context, Result};
use epserde::prelude::*;
use std::path::{Path, PathBuf};

/// Returns the cache path associated with an input file.
pub fn cache_path(input: impl AsRef<Path>) -> PathBuf {
    input.as_ref().with_extension("graph")
}

/// Persists a graph at the given path.
pub fn store(graph: &Csr, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    graph
        .store(path)
        .with_context(|| format!("Cannot store the graph cache {}", path.display()))?;
    Ok(())
}

/// Restores a cached graph, or returns `None` if there is no cache at the
/// given path.
pub fn load(path: impl AsRef<Path>) -> Result<Option<Csr>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    Csr::load_full(path)
        .map(Some)
        .with_context(|| format!("Cannot load the graph cache {}", path.display()))
}
