/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Matrix Market ingestion.
//!
//! Reads a symmetric sparse-matrix description into a [`Csr`], streaming the
//! file twice: a first pass counts degrees, a second pass fills the
//! successor slices, so no intermediate edge list is ever materialized.
//! Only the coordinator ingests; every other rank receives the result
//! through the distribution protocol.

use crate::graph::Csr;
use anyhow::{ensure, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

/// Reads a graph from a Matrix Market file.
///
/// The adjacency structure is symmetrized (every entry is stored in both
/// endpoints' successor slices) with indices converted from 1-based to
/// 0-based; self-loops, out-of-range entries, and weight columns are
/// ignored. Lines starting with `%` or `#` before the header are treated as
/// comments. Malformed data lines are skipped, and a file shorter than its
/// declared entry count is accepted.
pub fn read_mtx(path: impl AsRef<Path>) -> Result<Csr> {
    let path = path.as_ref();
    let mut file = BufReader::new(
        File::open(path).with_context(|| format!("Cannot open {}", path.display()))?,
    );

    let (num_nodes, num_entries) = read_header(&mut file)
        .with_context(|| format!("Cannot parse the header of {}", path.display()))?;
    ensure!(
        num_nodes <= u32::MAX as usize,
        "{} declares {} nodes, more than node ids can address",
        path.display(),
        num_nodes
    );

    // Pass 1: degrees
    let mut degrees = vec![0u64; num_nodes];
    for_each_entry(&mut file, num_entries, num_nodes, |u, v| {
        degrees[u] += 1;
        degrees[v] += 1;
    })?;

    let mut offsets = Vec::with_capacity(num_nodes + 1);
    let mut cumul = 0u64;
    offsets.push(0);
    for &d in &degrees {
        cumul += d;
        offsets.push(cumul);
    }
    drop(degrees);

    // Pass 2: fill the successor slices
    file.seek(SeekFrom::Start(0))
        .with_context(|| format!("Cannot rewind {}", path.display()))?;
    read_header(&mut file)?;

    let mut edges = vec![0u32; cumul as usize];
    let mut cursor = offsets[..num_nodes].to_vec();
    for_each_entry(&mut file, num_entries, num_nodes, |u, v| {
        edges[cursor[u] as usize] = v as u32;
        cursor[u] += 1;
        edges[cursor[v] as usize] = u as u32;
        cursor[v] += 1;
    })?;

    // SAFETY: the offsets are the prefix sums of the degrees counted by the
    // first pass over the same entries filled by the second one.
    Ok(unsafe { Csr::from_parts(num_nodes, offsets.into(), edges.into()) })
}

/// Skips comments and parses the `rows cols entries` header line.
fn read_header(file: &mut impl BufRead) -> Result<(usize, u64)> {
    let mut line = String::new();
    loop {
        line.clear();
        ensure!(
            file.read_line(&mut line)? != 0,
            "Unexpected end of file while looking for the header"
        );
        if !line.starts_with('%') && !line.starts_with('#') && !line.trim().is_empty() {
            break;
        }
    }
    let mut tokens = line.split_whitespace();
    let rows: usize = tokens
        .next()
        .context("Missing row count")?
        .parse()
        .context("Invalid row count")?;
    let cols: usize = tokens
        .next()
        .context("Missing column count")?
        .parse()
        .context("Invalid column count")?;
    let num_entries: u64 = tokens
        .next()
        .context("Missing entry count")?
        .parse()
        .context("Invalid entry count")?;
    Ok((rows.max(cols), num_entries))
}

/// Applies `op` to every well-formed, in-range, non-loop entry.
fn for_each_entry(
    file: &mut impl BufRead,
    num_entries: u64,
    num_nodes: usize,
    mut op: impl FnMut(usize, usize),
) -> Result<()> {
    let mut line = String::new();
    for _ in 0..num_entries {
        line.clear();
        if file.read_line(&mut line)? == 0 {
            break;
        }
        if let Some((u, v)) = parse_entry(&line, num_nodes) {
            op(u, v);
        }
    }
    Ok(())
}

fn parse_entry(line: &str, num_nodes: usize) -> Option<(usize, usize)> {
    let mut tokens = line.split_whitespace();
    let u = tokens.next()?.parse::<i64>().ok()? - 1;
    let v = tokens.next()?.parse::<i64>().ok()? - 1;
    if u < 0 || v < 0 {
        return None;
    }
    let (u, v) = (u as usize, v as usize);
    (u < num_nodes && v < num_nodes && u != v).then_some((u, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entry() {
        assert_eq!(parse_entry("3 5 0.25\n", 10), Some((2, 4)));
        // self-loop
        assert_eq!(parse_entry("4 4\n", 10), None);
        // out of range
        assert_eq!(parse_entry("1 11\n", 10), None);
        // 0-based input would underflow the 1-based conversion
        assert_eq!(parse_entry("0 3\n", 10), None);
        // malformed
        assert_eq!(parse_entry("7\n", 10), None);
        assert_eq!(parse_entry("a b\n", 10), None);
    }
}
