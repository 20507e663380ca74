// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bp2build::bazel::cquery::{cquery_starlark_file_contents, ConfigKey, CqueryRequests, RequestType};
use serde::Deserialize;
use tracing::instrument;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// JSON file listing the requests.
    #[arg(long, value_name = "FILE")]
    requests: PathBuf,

    /// Path to write the formatter program to.
    #[arg(long, value_name = "FILE")]
    output: PathBuf,
}

/// A request as listed in a requests file.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct RequestInput {
    label: String,
    request_type: RequestType,
    #[serde(default)]
    config: ConfigKey,
}

fn parse_requests(contents: &str) -> Result<CqueryRequests> {
    let inputs: Vec<RequestInput> = serde_json::from_str(contents)?;
    let mut requests = CqueryRequests::new();
    for input in inputs {
        if !requests.queue(&input.label, input.request_type, input.config) {
            tracing::debug!("Ignoring duplicate request for {}", input.label);
        }
    }
    Ok(requests)
}

/// Loads cquery requests from a JSON file. Duplicate requests are merged.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_requests(path: &Path) -> Result<CqueryRequests> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_requests(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn cquery_starlark_main(args: Args) -> Result<()> {
    let requests = load_requests(&args.requests)?;
    let contents = cquery_starlark_file_contents(&requests)?;
    std::fs::write(&args.output, contents)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    tracing::info!(
        "Wrote the formatter for {} requests to {}",
        requests.len(),
        args.output.display()
    );
    Ok(())
}
