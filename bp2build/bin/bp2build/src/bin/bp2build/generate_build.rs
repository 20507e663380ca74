// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use bp2build::codegen::{generate_build_file, BazelTargets, TargetInput};
use itertools::Itertools;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// JSON file listing the targets of a single package.
    #[arg(long, value_name = "FILE")]
    targets: PathBuf,

    /// Path of the BUILD file to write.
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
}

fn build_targets(inputs: &[TargetInput]) -> Result<BazelTargets> {
    let packages = inputs.iter().map(|input| input.package.as_str()).unique().collect_vec();
    ensure!(
        packages.len() <= 1,
        "Targets span multiple packages: {}",
        packages.join(", ")
    );

    let mut targets = BazelTargets::default();
    for input in inputs {
        let target = input
            .to_target()
            .with_context(|| format!("Invalid target {}", input.name))?;
        targets.push(target);
    }
    Ok(targets)
}

pub fn generate_build_main(args: Args) -> Result<()> {
    let contents = std::fs::read_to_string(&args.targets)
        .with_context(|| format!("Failed to read {}", args.targets.display()))?;
    let inputs: Vec<TargetInput> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", args.targets.display()))?;

    let targets = build_targets(&inputs)?;
    let build_file = generate_build_file(&targets)?;
    std::fs::write(&args.output, build_file)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!(
        "Generated {} with {} targets",
        args.output.display(),
        targets.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_build_main() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let targets = dir.path().join("targets.json");
        let output = dir.path().join("BUILD.bazel");
        std::fs::write(
            &targets,
            r#"[
                {
                    "name": "libfoo",
                    "package": "foo",
                    "rule_class": "cc_library_shared",
                    "bzl_load_location": "//build/bazel/rules/cc:cc_library_shared.bzl",
                    "attributes": {
                        "copts": {"type": "string_list", "value": ["-Wall", "-DFOO=\"1\""]},
                        "stem": {"type": "string", "value": "libfoo2"}
                    }
                },
                {
                    "name": "data",
                    "package": "foo",
                    "rule_class": "filegroup",
                    "attributes": {
                        "srcs": {
                            "type": "label_list",
                            "value": ["a.txt"],
                            "selects": {"os": {"android": ["b.txt"]}}
                        }
                    }
                }
            ]"#,
        )?;

        generate_build_main(Args {
            targets,
            output: output.clone(),
        })?;

        assert_eq!(
            std::fs::read_to_string(output)?,
            r#"# AUTO-GENERATED FILE. DO NOT EDIT.

load("//build/bazel/rules/cc:cc_library_shared.bzl", "cc_library_shared")

filegroup(
    name = "data",
    srcs = ["a.txt"] + select({
        "//build/bazel_common_rules/platforms/os:android": ["b.txt"],
        "//conditions:default": [],
    }),
)

cc_library_shared(
    name = "libfoo",
    copts = [
        "-Wall",
        "-DFOO=\"1\"",
    ],
    stem = "libfoo2",
)
"#
        );
        Ok(())
    }

    #[test]
    fn test_multiple_packages() -> Result<()> {
        let inputs: Vec<TargetInput> = serde_json::from_str(
            r#"[
                {"name": "a", "package": "x", "rule_class": "filegroup"},
                {"name": "b", "package": "y", "rule_class": "filegroup"}
            ]"#,
        )?;
        assert!(build_targets(&inputs).is_err());
        Ok(())
    }
}
