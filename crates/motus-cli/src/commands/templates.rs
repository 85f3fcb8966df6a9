//! Template listing and information command.

#![allow(clippy::print_literal)] // Table headers use literal strings intentionally

use super::common::{format_default, format_range};
use clap::Args;
use motus_patch::TemplateRegistry;

#[derive(Args)]
pub struct TemplatesArgs {
    /// Show details for a specific template
    #[arg(value_name = "TEMPLATE")]
    template: Option<String>,
}

pub fn run(args: TemplatesArgs) -> anyhow::Result<()> {
    let registry = TemplateRegistry::new();

    if let Some(id) = &args.template {
        let template = registry
            .all_templates()
            .into_iter()
            .find(|t| t.id.eq_ignore_ascii_case(id))
            .ok_or_else(|| anyhow::anyhow!("Unknown template: {}", id))?;

        let title = format!("{} ({})", template.name, template.id);
        println!("{}", title);
        println!("{}", "=".repeat(title.len()));
        println!();
        println!("{}", template.description);
        println!("Category: {}", template.category.name());
        if template.modulator {
            println!("Modulator: usable as a route source");
        }
        println!();

        println!("Parameters:");
        println!();
        println!(
            "  {:12}  {:10}  {:10}  {:>6}  {}",
            "Name", "Kind", "Default", "Slew", "Range"
        );
        println!(
            "  {:12}  {:10}  {:10}  {:>6}  {}",
            "----", "----", "-------", "----", "-----"
        );
        for param in template.params {
            println!(
                "  {:12}  {:10}  {:10}  {:>6}  {}",
                param.name,
                param.kind.name(),
                format_default(param),
                format!("{}ms", param.slew_ms),
                format_range(param)
            );
        }

        if let Some(first) = template.params.first() {
            println!();
            println!("Route target syntax: <nodeId>.<param>, e.g. n1.{}", first.name);
        }
    } else {
        println!("Available Templates");
        println!("===================");
        println!();

        for template in registry.all_templates() {
            let marker = if template.modulator { " (modulator)" } else { "" };
            println!("  {:8} - {}{}", template.id, template.description, marker);
        }

        println!();
        println!("Use 'motus templates <id>' for parameter details.");
    }

    Ok(())
}
