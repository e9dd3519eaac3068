//! `usbllm models`: print the registry and which model files are present.

use std::path::Path;

use usbllm_core::models::{registry_candidates, resolve_with_registry};
use usbllm_core::{LauncherConfig, ModelStatus, RegistryEntry, load_registry};

fn format_size(size_mb: Option<f64>) -> String {
    size_mb.map_or_else(|| "-".to_string(), |mb| format!("{mb:.0} MB"))
}

/// Table rows for `entries`, one per registry entry.
pub fn render(models_dir: &Path, entries: &[RegistryEntry]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:<24} {:<8} {:>9}  {}",
        "ID", "STATUS", "SIZE", "FILE"
    )];
    for entry in entries {
        let status = if models_dir.join(&entry.file).is_file() {
            "ok"
        } else {
            "missing"
        };
        lines.push(format!(
            "{:<24} {:<8} {:>9}  {}",
            entry.id,
            status,
            format_size(entry.size_mb),
            entry.file
        ));
    }
    lines
}

pub fn execute(config: &LauncherConfig) -> anyhow::Result<()> {
    let candidates = registry_candidates(&config.models_dir);
    let entries = load_registry(&candidates);

    if entries.is_empty() {
        println!("No model registry found. Looked in:");
        for path in &candidates {
            println!("  {}", path.display());
        }
        return Ok(());
    }

    for line in render(&config.models_dir, &entries) {
        println!("{line}");
    }

    let selected = resolve_with_registry(config, &entries);
    match selected.status {
        ModelStatus::None => println!("\nNo model selected (set USBLLM_MODEL_ID or USBLLM_MODEL_FILE)."),
        status => println!(
            "\nSelected: {} ({})",
            selected.id.or(selected.basename).as_deref().unwrap_or("?"),
            if status == ModelStatus::Ok { "ok" } else { "missing" }
        ),
    }
    Ok(())
}
