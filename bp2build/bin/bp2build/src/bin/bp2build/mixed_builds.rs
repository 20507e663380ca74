// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use anyhow::Result;
use bp2build::allowlists::{dcla_enabled_modules, AllowlistData, MixedBuildMode, MixedBuildsContext};

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Which lists are in effect: prod or staging.
    #[arg(long, value_name = "MODE")]
    mode: MixedBuildMode,

    /// Module enabled in addition to the lists. Can be repeated.
    #[arg(long = "force-enable", value_name = "NAME")]
    force_enabled: Vec<String>,

    /// Lists the libraries enabled within APEXes instead.
    #[arg(long)]
    dcla: bool,

    /// Only checks whether this module is handed to Bazel.
    #[arg(long, value_name = "NAME", conflicts_with = "dcla")]
    module: Option<String>,

    /// Checks `--module` as being part of an APEX.
    #[arg(long, requires = "module")]
    within_apex: bool,
}

fn list_modules(args: &Args, data: &AllowlistData) -> Vec<String> {
    if args.dcla {
        return dcla_enabled_modules(data, args.mode).into_iter().collect();
    }
    let context = MixedBuildsContext::new(data, args.mode, &args.force_enabled);
    match &args.module {
        Some(name) => {
            let allowed = context.is_module_name_allowed(name, args.within_apex);
            vec![format!("{name}\t{allowed}")]
        }
        None => context
            .enabled_modules()
            .into_iter()
            .map(|s| s.to_owned())
            .collect(),
    }
}

pub fn mixed_builds_main(args: Args, data: &AllowlistData) -> Result<()> {
    for line in list_modules(&args, data) {
        println!("{line}");
    }
    Ok(())
}
