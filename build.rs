// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: library root
fn root_arg() -> Arg {
    Arg::new("root").required(true).value_name("ROOT").help("Library root")
}

/// Common argument: POPS image
fn image_arg() -> Arg {
    Arg::new("image").required(true).value_name("IMAGE").help("POPS image (.vcd)")
}

fn build_cli() -> Command {
    Command::new("discshelf")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Discshelf Contributors")
        .about("PS2/PS1 disc image library manager")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .global(true)
                .help("Path to the config file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .arg(
            Arg::new("log_progress")
                .long("log-progress")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log progress instead of drawing a progress bar"),
        )
        .subcommand(
            Command::new("scan")
                .about("Identify the game in an image or CUE sheet")
                .arg(Arg::new("path").required(true).help("Image (.iso, .bin, .vcd) or sheet (.cue)")),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a CUE/BIN dump to a POPS .vcd image")
                .arg(Arg::new("cue").required(true).help("CUE sheet to convert"))
                .arg(Arg::new("output").required(true).help("Output image path"))
                .arg(
                    Arg::new("root")
                        .short('r')
                        .long("root")
                        .help("Library root; creates the launcher and registry entry afterwards"),
                )
                .arg(Arg::new("name").long("name").help("Display name for the registry entry")),
        )
        .subcommand(
            Command::new("move")
                .about("Move an image, copying across volumes when needed")
                .arg(Arg::new("source").required(true).help("Image to move"))
                .arg(Arg::new("destination").required(true).help("Destination file or directory")),
        )
        .subcommand(
            Command::new("list")
                .about("List images under CD, DVD and POPS")
                .arg(root_arg()),
        )
        .subcommand(
            Command::new("art")
                .about("List cover art under ART")
                .arg(root_arg()),
        )
        .subcommand(
            Command::new("fetch-art")
                .about("Download cover, icon and screenshot art into ART")
                .arg(root_arg())
                .arg(Arg::new("game_id").required(true).help("Product code, e.g. SLUS_203.12"))
                .arg(
                    Arg::new("ps1")
                        .long("ps1")
                        .action(ArgAction::SetTrue)
                        .help("Fetch from the PS1 art set instead of PS2"),
                ),
        )
        .subcommand(
            Command::new("rename")
                .about("Rename an image to <GAME_ID>.<NAME><ext>")
                .arg(Arg::new("path").required(true).help("Image to rename"))
                .arg(Arg::new("game_id").required(true).help("Product code, e.g. SLUS_203.12"))
                .arg(Arg::new("game_name").required(true).help("Title")),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete an image with its art, launcher and registry entry")
                .arg(root_arg())
                .arg(Arg::new("game_id").required(true).help("Product code used for the art files"))
                .arg(Arg::new("path").required(true).help("Image to delete")),
        )
        .subcommand(
            Command::new("companion")
                .about("Launcher stub and registry management")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Create the launcher stub and registry entry for a POPS image")
                        .arg(root_arg())
                        .arg(image_arg())
                        .arg(Arg::new("name").long("name").help("Display name for the registry entry")),
                )
                .subcommand(
                    Command::new("remove")
                        .about("Remove the launcher stub and registry entry for a POPS image")
                        .arg(root_arg())
                        .arg(image_arg()),
                ),
        )
        .subcommand(Command::new("doctor").about("Check the converter, merge tool and title catalogs"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("discshelf.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
