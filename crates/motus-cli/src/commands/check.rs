//! Patch file checking command.
//!
//! Runs a patch document through the sanitizer, prints what it contains and
//! every repair made, and optionally writes the repaired document.

use super::common::{format_base, print_report, read_patch};
use clap::Args;
use motus_patch::{Patch, TemplateRegistry};
use std::path::PathBuf;

#[derive(Args)]
pub struct CheckArgs {
    /// Patch file (JSON)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Write the sanitized patch to this file
    #[arg(short, long, value_name = "OUT")]
    write: Option<PathBuf>,

    /// Exit with an error if any repair was needed
    #[arg(long)]
    strict: bool,

    /// List nodes, sources and routes
    #[arg(short, long)]
    detailed: bool,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let registry = TemplateRegistry::new();
    let (patch, report) = read_patch(&args.file, &registry)?;

    println!("Patch: {}", args.file.display());
    println!(
        "  {} nodes, {} edges, {} sources, {} routes",
        patch.nodes.len(),
        patch.edges.len(),
        patch.sources.len(),
        patch.routes.len()
    );
    println!();

    if args.detailed {
        print_contents(&patch);
    }

    print_report(&report);

    if let Some(out) = &args.write {
        std::fs::write(out, patch.to_json()?)?;
        println!();
        println!("Wrote sanitized patch to {}", out.display());
    }

    if args.strict && !report.is_clean() {
        anyhow::bail!("{} repair(s) needed", report.len());
    }
    Ok(())
}

fn print_contents(patch: &Patch) {
    println!("Nodes:");
    for node in &patch.nodes {
        let params: Vec<String> = node
            .params
            .iter()
            .map(|(name, value)| format!("{}={}", name, format_base(&value.base)))
            .collect();
        println!("  {:6} {:8} {}", node.id, node.template, params.join(" "));
    }

    if !patch.edges.is_empty() {
        println!();
        println!("Edges:");
        for edge in &patch.edges {
            println!("  {} -> {}", edge.from(), edge.to());
        }
    }

    if !patch.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &patch.sources {
            println!(
                "  {:6} {:?} metric={} [{}, {}]",
                source.id, source.kind, source.metric, source.pipe.min, source.pipe.max
            );
        }
    }

    if !patch.routes.is_empty() {
        println!();
        println!("Routes (evaluation order):");
        for (i, route) in patch.routes.iter().enumerate() {
            println!(
                "  {}. {:4} {} -> {} {:?} amount={} range=[{}, {}] curve={:?}",
                i + 1,
                route.id,
                route.src,
                route.target,
                route.op,
                route.amount,
                route.range[0],
                route.range[1],
                route.curve
            );
        }
    }
    println!();
}
