//! Shared CLI helpers used across multiple commands.

use std::path::Path;

use anyhow::Context;
use motus_core::{ParamBase, ParamDefault, ParamDescriptor, ParamKind};
use motus_patch::{Patch, SanitizeReport, TemplateRegistry, get_factory_patch, is_factory_patch, sanitize_str};

/// Parse a `key=value` string for clap's `value_parser`.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 {
        return Err(format!(
            "Invalid parameter format: '{}' (expected key=value)",
            s
        ));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Parse a `name=value` sensor reading.
pub fn parse_metric(s: &str) -> Result<(String, f64), String> {
    let (name, value) = parse_key_val(s)?;
    if name.is_empty() {
        return Err(format!("Missing metric name in '{}'", s));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid metric value in '{}' (expected a number)", s))?;
    Ok((name, value))
}

/// Read and sanitize a patch file.
pub fn read_patch(path: &Path, registry: &TemplateRegistry) -> anyhow::Result<(Patch, SanitizeReport)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    sanitize_str(&text, registry).with_context(|| format!("Failed to import {}", path.display()))
}

/// Load a patch by factory name or file path.
///
/// Factory names win over files of the same name in the working directory.
pub fn load_patch(name: &str, registry: &TemplateRegistry) -> anyhow::Result<(Patch, SanitizeReport)> {
    if is_factory_patch(name) {
        let patch = get_factory_patch(name, registry)?;
        return Ok((patch, SanitizeReport::default()));
    }
    let path = Path::new(name);
    if path.exists() {
        return read_patch(path, registry);
    }
    anyhow::bail!("'{}' is neither a factory patch nor a file", name)
}

/// Print every repair in a sanitize report, one per line.
pub fn print_report(report: &SanitizeReport) {
    if report.is_clean() {
        println!("No repairs needed.");
        return;
    }
    println!("Repairs ({}):", report.len());
    for repair in &report.repairs {
        println!("  - {}", repair);
    }
}

/// Display form of a stored parameter base.
pub fn format_base(base: &ParamBase) -> String {
    match base {
        ParamBase::Flag(flag) => flag.to_string(),
        ParamBase::Number(value) => format!("{}", value),
        ParamBase::Text(text) => text.clone(),
    }
}

/// Display form of a parameter's default.
pub fn format_default(desc: &ParamDescriptor) -> String {
    match desc.default {
        ParamDefault::Number(value) => format!("{}", value),
        ParamDefault::Flag(flag) => flag.to_string(),
        ParamDefault::Choice(choice) => choice.to_string(),
    }
}

/// Display form of a parameter's domain.
pub fn format_range(desc: &ParamDescriptor) -> String {
    match desc.kind {
        ParamKind::Boolean => "on/off".to_string(),
        ParamKind::Select => desc.options.join(" | "),
        ParamKind::Frequency => format!("{}..{} Hz", desc.min, desc.max),
        ParamKind::Time => format!("{}..{} ms", desc.min, desc.max),
        ParamKind::Linear | ParamKind::Integer => format!("{}..{}", desc.min, desc.max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_val_splits_on_first_equals() {
        assert_eq!(
            parse_key_val("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
        assert!(parse_key_val("nope").is_err());
    }

    #[test]
    fn metric_values_must_be_numbers() {
        assert_eq!(parse_metric("pitch=12.5"), Ok(("pitch".to_string(), 12.5)));
        assert_eq!(
            parse_metric("accel.x=-0.5"),
            Ok(("accel.x".to_string(), -0.5))
        );
        assert!(parse_metric("pitch=up").is_err());
        assert!(parse_metric("=1").is_err());
    }

    #[test]
    fn ranges_read_naturally() {
        let registry = TemplateRegistry::new();
        let cutoff = registry.param("filter", "cutoff").unwrap();
        assert_eq!(format_range(cutoff), "20..20000 Hz");
        let mode = registry.param("filter", "mode").unwrap();
        assert_eq!(format_range(mode), "lowpass | highpass | bandpass | notch");
    }
}
