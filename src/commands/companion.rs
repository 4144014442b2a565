// src/commands/companion.rs

//! Launcher stub and registry commands

use super::Context;
use anyhow::{Context as _, Result};
use discshelf::companion;
use std::path::Path;

/// Create the launcher stub and registry entry for a POPS image
pub async fn cmd_companion_add(ctx: &Context, root: &Path, image: &Path, name: Option<&str>) -> Result<()> {
    let stub = companion::ensure_launcher(image, root, &ctx.settings)
        .await
        .context("Failed to create launcher")?;
    let update = companion::add_registry_entry(root, name, &stub.elf_name)
        .await
        .context("Failed to update registry")?;

    if ctx.json {
        let value = serde_json::json!({ "success": true, "launcher": stub, "registry": update });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if stub.skipped {
        println!("Launcher {} already present", stub.elf_name);
    } else {
        println!("Created launcher {}", stub.new_path.display());
    }
    match update.entry {
        Some(entry) => println!("Added registry entry: {}", entry),
        None => println!("Registry already lists {}", stub.elf_name),
    }
    Ok(())
}

/// Remove the launcher stub and registry entry for a POPS image
pub async fn cmd_companion_remove(ctx: &Context, root: &Path, image: &Path) -> Result<()> {
    let elf_name = companion::launcher_name_for(image);
    let removed = companion::remove_launcher(root, &elf_name).await?;
    let update = companion::remove_registry_entry(root, &elf_name).await?;

    if ctx.json {
        let value = serde_json::json!({
            "success": true,
            "elfName": elf_name,
            "launcherRemoved": removed,
            "registry": update,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if removed {
        println!("Removed launcher {}", elf_name);
    } else {
        println!("Launcher {} not present", elf_name);
    }
    if !update.skipped {
        println!("Removed registry entry for {}", elf_name);
    }
    Ok(())
}
