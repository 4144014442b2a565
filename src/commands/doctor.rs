// src/commands/doctor.rs

//! Environment check for external tools and catalogs

use super::Context;
use anyhow::{Result, bail};
use discshelf::catalog::{CatalogLookup, global_catalog};
use discshelf::{DiscFamily, Settings, convert, merge};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What a conversion would find on this machine
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DoctorReport {
    success: bool,
    bundled_converter: bool,
    /// Configured template, when it carries both placeholders
    converter_command: Option<String>,
    merge_tool: Option<PathBuf>,
    ps2_catalog: bool,
    ps1_catalog: bool,
}

fn usable_template(settings: &Settings) -> Option<String> {
    settings.converter_command.clone().filter(|template| {
        convert::build_converter_command(template, Path::new("in.cue"), Path::new("out.vcd")).is_some()
    })
}

/// Report which converter, merge tool and catalogs are available
///
/// Fails when no converter can be used; the merge tool and catalogs are
/// only needed for multi-track dumps and titles.
pub async fn cmd_doctor(ctx: &Context) -> Result<()> {
    let catalog = global_catalog(&ctx.settings);
    catalog.prepare(DiscFamily::Ps2).await;
    catalog.prepare(DiscFamily::Ps1).await;

    let bundled_converter = convert::bundled_converter_available(&ctx.settings);
    let converter_command = usable_template(&ctx.settings);
    let report = DoctorReport {
        success: bundled_converter || converter_command.is_some(),
        bundled_converter,
        converter_command,
        merge_tool: merge::locate_merge_tool(&ctx.settings).ok(),
        ps2_catalog: catalog.is_available(DiscFamily::Ps2),
        ps1_catalog: catalog.is_available(DiscFamily::Ps1),
    };

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let converter = match (report.bundled_converter, &report.converter_command) {
            (true, _) => format!("bundled {}", convert::CONVERTER_TOOL),
            (false, Some(command)) => format!("command `{}`", command),
            (false, None) => "missing".to_string(),
        };
        println!("Converter:    {}", converter);
        match &report.merge_tool {
            Some(path) => println!("Merge tool:   {}", path.display()),
            None => println!("Merge tool:   missing (multi-track dumps cannot be converted)"),
        }
        println!("PS2 catalog:  {}", if report.ps2_catalog { "loaded" } else { "missing" });
        println!("PS1 catalog:  {}", if report.ps1_catalog { "loaded" } else { "missing" });
    }

    if !report.success {
        bail!("No usable converter");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_template_needs_both_placeholders() {
        let mut settings = Settings {
            converter_command: Some("cue2pops {cue}".to_string()),
            ..Default::default()
        };
        assert!(usable_template(&settings).is_none());

        settings.converter_command = Some("cue2pops {cue} {vcd}".to_string());
        assert_eq!(usable_template(&settings).as_deref(), Some("cue2pops {cue} {vcd}"));
    }
}
