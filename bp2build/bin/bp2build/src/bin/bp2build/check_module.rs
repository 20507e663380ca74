// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use anyhow::Result;
use bp2build::allowlists::{AllowlistData, ConversionAllowlist, ModuleInfo};
use colored::Colorize;

#[derive(clap::Args, Debug, PartialEq, Eq)]
pub struct Args {
    /// Directory of the module relative to the workspace root.
    #[arg(long, value_name = "DIR")]
    dir: String,

    /// Name of the module.
    #[arg(long, value_name = "NAME")]
    name: String,

    /// Type of the module, e.g. cc_library.
    #[arg(long = "type", value_name = "TYPE")]
    module_type: String,

    /// The bp2build_available property of the module, if set.
    #[arg(long, value_name = "BOOL")]
    bp2build_available: Option<bool>,
}

#[derive(Debug, PartialEq, Eq)]
struct Verdict {
    convert: bool,
    package_default: bool,
    decided_by: String,
}

fn check_module(allowlist: &ConversionAllowlist, module: &ModuleInfo) -> Result<Verdict> {
    let convert = allowlist.should_convert(module)?;
    let (package_default, decided_by) = allowlist.package_default(&module.dir);
    Ok(Verdict {
        convert,
        package_default,
        decided_by,
    })
}

pub fn check_module_main(args: Args, data: &AllowlistData) -> Result<()> {
    let module = ModuleInfo {
        name: args.name,
        module_type: args.module_type,
        dir: args.dir,
        bp2build_available: args.bp2build_available,
    };
    let verdict = check_module(&ConversionAllowlist::from_data(data), &module)?;

    println!(
        "{}:\t{}",
        module.name,
        if verdict.convert {
            "convert".green()
        } else {
            "skip".red()
        }
    );
    println!(
        "Package default:\t{} (from {})",
        verdict.package_default, verdict.decided_by
    );
    Ok(())
}
