// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod check_module;
mod cquery_starlark;
mod generate_build;
mod keep_build_file;
mod mixed_builds;
mod ninja_weight;
mod parse_cquery;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Result;
use bp2build::allowlists::AllowlistData;
use clap::{Parser, Subcommand};
use cliutil::{cli_main, handle_top_level_result, ConfigBuilder};

use crate::check_module::check_module_main;
use crate::cquery_starlark::cquery_starlark_main;
use crate::generate_build::generate_build_main;
use crate::keep_build_file::keep_build_file_main;
use crate::mixed_builds::mixed_builds_main;
use crate::ninja_weight::ninja_weight_main;
use crate::parse_cquery::parse_cquery_main;

#[derive(Parser, Debug)]
#[command(name = "bp2build")]
#[command(author = "ChromiumOS Authors")]
#[command(about = "Inspects conversion allowlists and generates Bazel files", long_about = None)]
struct Cli {
    /// TOML file merged on top of the built-in allowlists. Can be repeated;
    /// later files take precedence.
    #[arg(long, value_name = "FILE", global = true)]
    allowlist_overlay: Vec<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decides whether a module is converted to Bazel.
    CheckModule(check_module::Args),
    /// Decides whether hand-written BUILD files of directories are kept.
    KeepBuildFile(keep_build_file::Args),
    /// Prints the effective allowlists as TOML.
    DumpAllowlists,
    /// Lists the modules built by Bazel in mixed builds.
    MixedBuilds(mixed_builds::Args),
    /// Computes ninja scheduling weights of modules.
    NinjaWeight(ninja_weight::Args),
    /// Parses cquery results to JSON.
    ParseCquery(parse_cquery::Args),
    /// Generates the Starlark formatter program for cquery requests.
    CqueryStarlark(cquery_starlark::Args),
    /// Generates a BUILD file from target descriptions.
    GenerateBuild(generate_build::Args),
}

fn load_allowlists(overlays: &[PathBuf]) -> Result<AllowlistData> {
    let data = AllowlistData::load_with_overlays(overlays)?;
    if !overlays.is_empty() {
        tracing::info!("Merged {} allowlist overlays", overlays.len());
    }
    Ok(data)
}

fn do_main() -> Result<()> {
    let cli = Cli::try_parse()?;

    match cli.command {
        Commands::CheckModule(args) => {
            check_module_main(args, &load_allowlists(&cli.allowlist_overlay)?)
        }
        Commands::KeepBuildFile(args) => {
            keep_build_file_main(args, &load_allowlists(&cli.allowlist_overlay)?)
        }
        Commands::DumpAllowlists => {
            print!("{}", load_allowlists(&cli.allowlist_overlay)?.to_toml()?);
            Ok(())
        }
        Commands::MixedBuilds(args) => {
            mixed_builds_main(args, &load_allowlists(&cli.allowlist_overlay)?)
        }
        Commands::NinjaWeight(args) => {
            ninja_weight_main(args, &load_allowlists(&cli.allowlist_overlay)?)
        }
        Commands::ParseCquery(args) => parse_cquery_main(args),
        Commands::CqueryStarlark(args) => cquery_starlark_main(args),
        Commands::GenerateBuild(args) => generate_build_main(args),
    }
}

fn main() -> ExitCode {
    match ConfigBuilder::new().build() {
        Ok(config) => cli_main(do_main, config),
        Err(error) => handle_top_level_result::<(), _>(Err(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_overlay_flag() -> Result<()> {
        let cli = Cli::try_parse_from([
            "bp2build",
            "dump-allowlists",
            "--allowlist-overlay",
            "a.toml",
            "--allowlist-overlay",
            "b.toml",
        ])?;
        assert_eq!(
            cli.allowlist_overlay,
            vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")]
        );
        assert!(matches!(cli.command, Commands::DumpAllowlists));
        Ok(())
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(Cli::try_parse_from(["bp2build", "convert-everything"]).is_err());
    }
}
