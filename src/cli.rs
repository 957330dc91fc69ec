// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Command-line interface for Webgen
//!
//! This module provides the `webgen` command: argument parsing, logging
//! setup and one handler per subcommand.
//!
//! # Commands
//!
//! | Command     | Arguments                                       |
//! |-------------|-------------------------------------------------|
//! | `generate`  | `<input> <output> [--manifest <path>]`          |
//! | `vgenerate` | `<input> <versions> [--deploy-dir <dir>]`       |
//! | `vcurrent`  | `<versions> <version\|latest> [--deploy-dir <dir>]` |
//! | `vinfo`     | `<versions>`                                    |
//! | `vgc`       | `<versions>`                                    |
//! | `deploy`    | `<output> <deploy dir> <manifest>`              |
//! | `undeploy`  | `<output> <deploy dir> <manifest>`              |
//!
//! Exit codes are `0` on success, `2` on usage errors, `75` when the
//! versions root is locked by another process (retry later) and `1` on
//! any other failure.
//!
//! # Examples
//!
//! ```
//! use webgen::cli;
//!
//! let matches = cli::build()
//!     .try_get_matches_from(["webgen", "vinfo", "versions"])
//!     .unwrap();
//!
//! let (name, sub) = matches.subcommand().unwrap();
//! assert_eq!(name, "vinfo");
//! assert!(sub.get_one::<std::path::PathBuf>("versions").is_some());
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use env_logger::{Builder, Env};

use crate::core::config::{ConfigBuilder, SiteConfig, DEFAULT_ENV_PREFIX};
use crate::core::error::WebgenError;
use crate::deploy;
use crate::generators::Generator;
use crate::versions::{is_version_name, VersionSelector, VersionStore};

/// The current version of Webgen, as defined in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds and configures the Webgen command-line interface.
pub fn build() -> Command {
    Command::new("webgen")
        .author("Webgen Contributors")
        .about("Generates static sites and manages versioned releases.")
        .version(VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Configuration file (TOML)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v, -vv, -vvv)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate a site from an input tree")
                .arg(path_arg("input", "Input directory"))
                .arg(path_arg("output", "Output directory"))
                .arg(
                    Arg::new("manifest")
                        .short('m')
                        .long("manifest")
                        .help("Write the list of generated files here")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("vgenerate")
                .about("Generate a site into a new version")
                .arg(path_arg("input", "Input directory"))
                .arg(path_arg("versions", "Versions directory"))
                .arg(deploy_dir_arg()),
        )
        .subcommand(
            Command::new("vcurrent")
                .about("Change the current version")
                .arg(path_arg("versions", "Versions directory"))
                .arg(
                    Arg::new("version")
                        .help("Version name, or `latest`")
                        .required(true)
                        .value_parser(parse_selector),
                )
                .arg(deploy_dir_arg()),
        )
        .subcommand(
            Command::new("vinfo")
                .about("List versions")
                .arg(path_arg("versions", "Versions directory")),
        )
        .subcommand(
            Command::new("vgc")
                .about("Delete versions older than the current one")
                .arg(path_arg("versions", "Versions directory")),
        )
        .subcommand(
            Command::new("deploy")
                .about("Copy the files a manifest lists into a deploy directory")
                .arg(path_arg("output", "Generated output directory"))
                .arg(path_arg("deploy_dir", "Deploy directory"))
                .arg(path_arg("manifest", "Manifest file")),
        )
        .subcommand(
            Command::new("undeploy")
                .about("Remove the files a manifest lists from a deploy directory")
                .arg(path_arg("output", "Generated output directory"))
                .arg(path_arg("deploy_dir", "Deploy directory"))
                .arg(path_arg("manifest", "Manifest file")),
        )
        .after_help(
            "\x1b[1;4mLicense:\x1b[0m\n  The project is licensed under the terms of \
             both the MIT license and the Apache License (Version 2.0).",
        )
}

fn path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .help(help)
        .required(true)
        .value_parser(value_parser!(PathBuf))
}

fn deploy_dir_arg() -> Arg {
    Arg::new("deploy_dir")
        .short('d')
        .long("deploy-dir")
        .help("Keep this directory in sync with the current version")
        .value_parser(value_parser!(PathBuf))
}

fn parse_selector(value: &str) -> std::result::Result<VersionSelector, String> {
    if value == "latest" || is_version_name(value) {
        value.parse().map_err(|e: WebgenError| e.to_string())
    } else {
        Err(format!(
            "`{value}` is neither a version name (YYYYMMDDHHMMSS) nor `latest`"
        ))
    }
}

/// Runs the command line of the current process. Returns the exit code.
pub fn execute() -> i32 {
    execute_from(std::env::args_os())
}

/// Runs the given command line. Returns the exit code.
pub fn execute_from<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = match build().try_get_matches_from(args) {
        Ok(matches) => matches,
        Err(e) => {
            _ = e.print();
            return e.exit_code();
        }
    };
    init_logging(matches.get_count("verbose"));

    match dispatch(&matches) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err:#}");
            err.downcast_ref::<WebgenError>()
                .map_or(1, WebgenError::exit_code)
        }
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // A logger may already be installed when running in-process.
    _ = Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn dispatch(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("generate", sub)) => generate(sub),
        Some(("vgenerate", sub)) => vgenerate(sub),
        Some(("vcurrent", sub)) => vcurrent(sub),
        Some(("vinfo", sub)) => vinfo(sub),
        Some(("vgc", sub)) => vgc(sub),
        Some(("deploy", sub)) => deploy_cmd(sub, false),
        Some(("undeploy", sub)) => deploy_cmd(sub, true),
        _ => unreachable!("subcommand_required guarantees a known subcommand"),
    }
}

fn path<'m>(matches: &'m ArgMatches, name: &str) -> &'m PathBuf {
    match matches.get_one::<PathBuf>(name) {
        Some(path) => path,
        None => unreachable!("`{name}` is a required argument"),
    }
}

fn load_config(matches: &ArgMatches) -> Result<SiteConfig> {
    let mut builder = ConfigBuilder::new().with_env_prefix(DEFAULT_ENV_PREFIX);
    if let Some(file) = matches.get_one::<PathBuf>("config") {
        builder = builder.with_file(file);
    }
    if let Ok(Some(dir)) = matches.try_get_one::<PathBuf>("deploy_dir") {
        builder = builder.with_override(
            "versions.deploy_dir",
            dir.to_string_lossy().into_owned(),
        );
    }
    builder.build().context("failed to load configuration")
}

fn generate(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let input = path(matches, "input");
    let output = path(matches, "output");

    let mut generator = Generator::from_config(&config)?;
    let report = generator.generate(input, output).with_context(|| {
        format!("failed to generate {}", input.display())
    })?;
    log::info!("Generated {} ({})", output.display(), report);

    if let Some(manifest_path) = matches.get_one::<PathBuf>("manifest") {
        report.manifest.save(manifest_path).with_context(|| {
            format!("failed to write manifest {}", manifest_path.display())
        })?;
    }
    _ = report.into_result()?;
    Ok(())
}

fn vgenerate(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let input = path(matches, "input");
    let store = VersionStore::from_config(path(matches, "versions"), &config.versions);

    let mut generator = Generator::from_config(&config)?;
    let generated = store
        .generate_version(&mut generator, input)
        .with_context(|| format!("failed to generate {}", input.display()))?;

    if generated.promoted {
        println!("Generated version {} and made current.", generated.timestamp);
    } else {
        println!("Generated version {}.", generated.timestamp);
    }
    if let Some(report) = generated.deployed {
        log::info!("Deploy: {}", report);
    }
    _ = generated.report.into_result()?;
    Ok(())
}

fn vcurrent(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let store = VersionStore::from_config(path(matches, "versions"), &config.versions);
    let selector = match matches.get_one::<VersionSelector>("version") {
        Some(selector) => selector,
        None => unreachable!("`version` is a required argument"),
    };

    let name = store
        .change_current(selector)
        .with_context(|| format!("failed to select version `{selector}`"))?;
    println!("Set current version to {name}.");
    Ok(())
}

fn vinfo(matches: &ArgMatches) -> Result<()> {
    let store = VersionStore::new(path(matches, "versions"));
    let listing = store.versions()?;

    if listing.versions.is_empty() {
        println!("No website versions.");
        return Ok(());
    }
    println!("Versions:");
    for (index, name) in listing.versions.iter().enumerate() {
        let marker = if listing.is_current(name) { " (current)" } else { "" };
        println!("  {index:2}. {name}{marker}");
    }
    Ok(())
}

fn vgc(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let store = VersionStore::from_config(path(matches, "versions"), &config.versions);
    let removed = store.garbage_collect()?;

    if removed.is_empty() {
        println!("Nothing to garbage collect or no current version to base from.");
    } else {
        println!("Garbage collected {} versions:", removed.len());
        for name in removed {
            println!("  {name}");
        }
    }
    Ok(())
}

fn deploy_cmd(matches: &ArgMatches, remove: bool) -> Result<()> {
    let output = path(matches, "output");
    let deploy_dir = path(matches, "deploy_dir");
    let manifest = path(matches, "manifest");

    let report = if remove {
        deploy::undeploy_manifest(output, deploy_dir, manifest)
    } else {
        deploy::deploy_manifest(output, deploy_dir, manifest)
    }
    .with_context(|| {
        format!(
            "failed to {} {}",
            if remove { "undeploy" } else { "deploy" },
            manifest.display()
        )
    })?;
    log::info!("{}", report);
    Ok(())
}
