/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The command-line interface.

use crate::cache;
use crate::comm::{Communicator, LocalComm, LocalGroup};
use crate::distribute::{broadcast_graph, identity_labels};
use crate::graph::Csr;
use crate::mtx::read_mtx;
use crate::propagate::{count_components, propagate};
use crate::thread_pool;
use anyhow::{ensure, Result};
use clap::Parser;
use dsi_progress_logger::prelude::*;
use log::{error, info};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(
    name = "concomp",
    version,
    about = "Computes the connected components of a symmetric graph by hybrid minimum-label propagation.",
    long_about = None
)]
struct Cli {
    /// The Matrix Market file containing the graph.
    graph: PathBuf,

    #[arg(short, long, default_value_t = 1)]
    /// The number of cooperating ranks the graph is distributed to.
    ranks: usize,

    #[arg(short, long)]
    /// The number of threads each rank relaxes labels with [default: the
    /// available parallelism divided by the number of ranks].
    threads: Option<usize>,

    #[arg(long)]
    /// Do not read or write the binary graph cache next to the input.
    no_cache: bool,
}

/// The main entry point of the command-line interface.
pub fn main(args: impl IntoIterator<Item = OsString>) -> Result<()> {
    let cli = Cli::parse_from(args);
    ensure!(cli.ranks > 0, "The number of ranks must be positive");
    let num_threads = cli
        .threads
        .unwrap_or_else(|| (num_cpus::get() / cli.ranks).max(1));

    let results = LocalGroup::run(cli.ranks, |comm| run_rank(comm, &cli, num_threads));
    for result in results {
        result?;
    }
    Ok(())
}

/// The work of one rank, coordinator duties included.
fn run_rank(comm: LocalComm, cli: &Cli, num_threads: usize) -> Result<()> {
    let graph = if comm.rank() == 0 {
        // A failed ingestion is reported here and turned into the sentinel
        // broadcast, so the whole group exits with an error together.
        load_graph(cli)
            .map_err(|e| error!("Ingestion failed: {e:#}"))
            .ok()
    } else {
        None
    };

    let graph = broadcast_graph(&comm, graph)?;
    if comm.rank() == 0 {
        info!(
            "Graph loaded: {} nodes, {} edge slots",
            graph.num_nodes(),
            graph.num_edge_slots()
        );
    }
    let mut labels = identity_labels(graph.num_nodes())?;
    let thread_pool = thread_pool![num_threads];

    comm.barrier()?;
    let start = Instant::now();
    let rounds = if comm.rank() == 0 {
        let mut pl = progress_logger![item_name = "round"];
        propagate(&graph, &mut labels, &comm, &thread_pool, &mut pl)?
    } else {
        propagate(&graph, &mut labels, &comm, &thread_pool, no_logging![])?
    };
    comm.barrier()?;

    if comm.rank() == 0 {
        let elapsed = start.elapsed().as_secs_f64();
        let components = count_components(&labels);
        info!("Converged after {} rounds", rounds);
        println!(
            "Nodes: {} | Components: {} | Time: {:.6} s",
            graph.num_nodes(),
            components,
            elapsed
        );
    }
    Ok(())
}

/// Loads the coordinator's graph, preferring the binary cache.
fn load_graph(cli: &Cli) -> Result<Csr> {
    let cache_path = cache::cache_path(&cli.graph);
    if !cli.no_cache {
        if let Some(graph) = cache::load(&cache_path)? {
            info!("Loaded cached graph from {}", cache_path.display());
            return Ok(graph);
        }
    }
    info!("Parsing {}...", cli.graph.display());
    let graph = read_mtx(&cli.graph)?;
    if !cli.no_cache {
        cache::store(&graph, &cache_path)?;
        info!("Cached graph to {}", cache_path.display());
    }
    Ok(graph)
}
