//! Factory patch commands.

use super::common::format_base;
use clap::Args;
use motus_patch::{
    TemplateRegistry, factory_patch_description, factory_patch_names, get_factory_patch,
};

#[derive(Args)]
pub struct PatchesArgs {
    /// Show details for a specific factory patch
    #[arg(value_name = "NAME")]
    name: Option<String>,

    /// Print the patch as JSON instead of a summary
    #[arg(long, requires = "name")]
    export: bool,
}

pub fn run(args: PatchesArgs) -> anyhow::Result<()> {
    let registry = TemplateRegistry::new();

    let Some(name) = &args.name else {
        println!("Factory Patches:");
        println!("================");
        for name in factory_patch_names() {
            let desc = factory_patch_description(name).unwrap_or("");
            println!("  {:14} - {}", name, desc);
        }
        println!();
        println!("Use 'motus patches <name>' for details, '--export' for JSON.");
        return Ok(());
    };

    let patch = get_factory_patch(name, &registry)?;
    if args.export {
        println!("{}", patch.to_json()?);
        return Ok(());
    }

    println!("Patch: {}", name);
    println!("{}", "=".repeat(7 + name.len()));
    println!();
    if let Some(desc) = factory_patch_description(name) {
        println!("{}", desc);
        println!();
    }

    println!("Nodes ({}):", patch.nodes.len());
    for node in &patch.nodes {
        let params: Vec<String> = node
            .params
            .iter()
            .map(|(param, value)| format!("{}={}", param, format_base(&value.base)))
            .collect();
        println!("  {:4} {:8} {}", node.id, node.template, params.join(" "));
    }

    if !patch.sources.is_empty() {
        println!();
        println!("Sources ({}):", patch.sources.len());
        for source in &patch.sources {
            println!("  {:6} {} ({})", source.id, source.label, source.metric);
        }
    }

    println!();
    println!("Routes ({}):", patch.routes.len());
    for (i, route) in patch.routes.iter().enumerate() {
        println!(
            "  {}. {} -> {} {:?} x{} [{}, {}]",
            i + 1,
            route.src,
            route.target,
            route.op,
            route.amount,
            route.range[0],
            route.range[1]
        );
    }

    Ok(())
}
