// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use anyhow::Result;
use bp2build::allowlists::{AllowlistData, ConversionAllowlist};

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Directories relative to the workspace root.
    #[arg(required = true, value_name = "DIR")]
    dirs: Vec<String>,
}

fn describe(allowlist: &ConversionAllowlist, dir: &str) -> String {
    let action = if allowlist.should_keep_existing_build_file_for_dir(dir) {
        "keep"
    } else {
        "generate"
    };
    format!("{dir}\t{action}")
}

pub fn keep_build_file_main(args: Args, data: &AllowlistData) -> Result<()> {
    let allowlist = ConversionAllowlist::from_data(data);
    for dir in &args.dirs {
        println!("{}", describe(&allowlist, dir));
    }
    Ok(())
}
