//! Prepare a data file for the search algorithms that need sorted input.
//!
//! Lines are keyed on their first `;`-separated field read as an integer.
//! Lines without a numeric key are dropped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

/// Arguments for the `sort-data` subcommand.
#[derive(Debug, Args)]
pub struct SortDataArgs {
    /// File to read
    #[arg(long)]
    pub input: PathBuf,

    /// File to write (may be the same as the input)
    #[arg(long)]
    pub output: PathBuf,
}

/// Counts reported after sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSummary {
    pub kept: usize,
    pub dropped: usize,
}

fn sort_key(line: &str) -> Option<i64> {
    line.split(';').next()?.trim().parse().ok()
}

/// Trim, drop blank and unkeyed lines, then order by key. Equal keys keep
/// their input order.
pub fn sort_lines(text: &str) -> (Vec<String>, usize) {
    let mut dropped = 0;
    let mut keyed: Vec<(i64, String)> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let key = sort_key(line);
            if key.is_none() {
                dropped += 1;
            }
            key.map(|k| (k, line.to_string()))
        })
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    (keyed.into_iter().map(|(_, line)| line).collect(), dropped)
}

/// Sort `input` into `output`. The input is fully read before the output is
/// written, so both may name the same file.
pub fn run(input: &Path, output: &Path) -> Result<SortSummary> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let (lines, dropped) = sort_lines(&text);

    let mut out = String::with_capacity(text.len());
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    fs::write(output, out).with_context(|| format!("failed to write {}", output.display()))?;

    if dropped > 0 {
        tracing::warn!("dropped {dropped} line(s) without a numeric first field");
    }
    tracing::info!(
        "sorted {} line(s): {} -> {}",
        lines.len(),
        input.display(),
        output.display()
    );
    Ok(SortSummary {
        kept: lines.len(),
        dropped,
    })
}
