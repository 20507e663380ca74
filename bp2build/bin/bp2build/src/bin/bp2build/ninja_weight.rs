// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::{collections::BTreeMap, path::PathBuf};

use anyhow::{bail, Context, Result};
use bp2build::allowlists::{format_weight_list, ninja_weight, AllowlistData};
use serde::Deserialize;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Type of a single module to compute the weight of.
    #[arg(long = "type", value_name = "TYPE", conflicts_with = "modules")]
    module_type: Option<String>,

    /// Number of dependencies and action inputs of the module.
    #[arg(long, value_name = "N", default_value_t = 0)]
    input_size: usize,

    /// JSON file listing modules. Prints the weight list of their outputs.
    #[arg(long, value_name = "FILE")]
    modules: Option<PathBuf>,
}

/// A module and one of its outputs as listed in the `--modules` file.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ModuleOutput {
    output: String,
    module_type: String,
    #[serde(default)]
    input_size: usize,
}

fn weight_list(data: &AllowlistData, modules: &[ModuleOutput]) -> String {
    let weights: BTreeMap<String, u32> = modules
        .iter()
        .filter_map(|module| {
            ninja_weight(
                &data.huge_module_type_prefixes,
                &module.module_type,
                module.input_size,
            )
            .map(|weight| (module.output.clone(), weight))
        })
        .collect();
    format_weight_list(&weights)
}

pub fn ninja_weight_main(args: Args, data: &AllowlistData) -> Result<()> {
    if let Some(path) = &args.modules {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let modules: Vec<ModuleOutput> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        print!("{}", weight_list(data, &modules));
        return Ok(());
    }

    let Some(module_type) = &args.module_type else {
        bail!("Either --type or --modules must be specified");
    };
    match ninja_weight(&data.huge_module_type_prefixes, module_type, args.input_size) {
        Some(weight) => println!("{weight}"),
        None => println!("not prioritized"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp2build::allowlists::Priority;

    #[test]
    fn test_weight_list() -> Result<()> {
        let data = AllowlistData {
            huge_module_type_prefixes: BTreeMap::from([("rust_".to_owned(), Priority::High)]),
            ..Default::default()
        };
        let modules: Vec<ModuleOutput> = serde_json::from_str(
            r#"[
                {"output": "out/librust.rlib", "module_type": "rust_library"},
                {"output": "out/small.o", "module_type": "cc_object", "input_size": 3},
                {"output": "out/big.o", "module_type": "cc_object", "input_size": 120}
            ]"#,
        )?;
        assert_eq!(
            weight_list(&data, &modules),
            "out/big.o,2000\nout/librust.rlib,10000\n"
        );
        Ok(())
    }
}
