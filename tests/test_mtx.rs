/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use concomp::cache;
use concomp::mtx::read_mtx;
use concomp::propagate::count_components;
use std::io::Write;

#[test]
fn test_read_mtx() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("graph.mtx");
    let mut file = std::fs::File::create(&path)?;
    write!(
        file,
        "%%MatrixMarket matrix coordinate real symmetric\n\
         % a comment\n\
         5 5 6\n\
         1 2 0.5\n\
         2 3 1.0\n\
         4 5\n\
         3 3\n\
         1 2\n\
         5 9\n"
    )?;
    drop(file);

    let graph = read_mtx(&path)?;
    assert_eq!(graph.num_nodes(), 5);
    // the self-loop (3, 3) and the out-of-range (5, 9) are dropped; the
    // duplicate (1, 2) is kept; every entry is stored in both directions
    assert_eq!(graph.num_edge_slots(), 8);
    assert_eq!(graph.successors(0), &[1, 1]);
    assert_eq!(graph.successors(1), &[0, 2, 0]);
    assert_eq!(graph.successors(2), &[1]);
    assert_eq!(graph.successors(3), &[4]);
    assert_eq!(graph.successors(4), &[3]);
    Ok(())
}

#[test]
fn test_read_mtx_short_file() -> Result<()> {
    // fewer data lines than the header declares
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("short.mtx");
    let mut file = std::fs::File::create(&path)?;
    write!(file, "3 3 10\n1 2\n")?;
    drop(file);

    let graph = read_mtx(&path)?;
    assert_eq!(graph.num_nodes(), 3);
    assert_eq!(graph.num_edge_slots(), 2);
    Ok(())
}

#[test]
fn test_read_mtx_rejects_garbage() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("bad.mtx");
    let mut file = std::fs::File::create(&path)?;
    write!(file, "% only comments\n")?;
    drop(file);
    assert!(read_mtx(&path).is_err());

    assert!(read_mtx(dir.path().join("missing.mtx")).is_err());
    Ok(())
}

#[test]
fn test_cache_roundtrip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("graph.mtx");
    let mut file = std::fs::File::create(&path)?;
    write!(file, "4 4 3\n1 2\n2 3\n3 4\n")?;
    drop(file);

    let graph = read_mtx(&path)?;
    let cache_path = cache::cache_path(&path);
    assert_eq!(cache_path, dir.path().join("graph.graph"));

    assert!(cache::load(&cache_path)?.is_none());
    cache::store(&graph, &cache_path)?;
    let restored = cache::load(&cache_path)?.expect("cache should exist");
    assert_eq!(restored, graph);
    Ok(())
}

#[test]
fn test_ingested_graph_components() -> Result<()> {
    use concomp::comm::{Communicator, LocalGroup};
    use concomp::distribute::{broadcast_graph, identity_labels};
    use concomp::propagate::propagate;
    use concomp::thread_pool;
    use dsi_progress_logger::prelude::*;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("graph.mtx");
    let mut file = std::fs::File::create(&path)?;
    // two components: {0, 1, 2} and {3, 4}; node 5 isolated
    write!(file, "6 6 3\n1 2\n2 3\n4 5\n")?;
    drop(file);

    let results = LocalGroup::run(2, |comm| {
        let graph = if comm.rank() == 0 {
            Some(read_mtx(&path)?)
        } else {
            None
        };
        let graph = broadcast_graph(&comm, graph)?;
        let mut labels = identity_labels(graph.num_nodes())?;
        let thread_pool = thread_pool![2];
        propagate(&graph, &mut labels, &comm, &thread_pool, no_logging![])?;
        Ok::<_, anyhow::Error>(labels)
    });
    for result in results {
        let labels = result?;
        assert_eq!(labels, vec![0, 0, 0, 3, 3, 5]);
        assert_eq!(count_components(&labels), 3);
    }
    Ok(())
}
