// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::{collections::BTreeMap, io::Read, path::PathBuf};

use anyhow::{bail, Context, Result};
use bp2build::bazel::cquery::{CqueryRequests, CqueryResult, CqueryResults, RequestType};

use crate::cquery_starlark::load_requests;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Request type of a single raw result, e.g. getCcInfo.
    #[arg(long, value_name = "NAME", required_unless_present = "requests")]
    request_type: Option<RequestType>,

    /// JSON file listing the requests. The input is then the whole output of
    /// the formatter program, and every request must have a result.
    #[arg(long, value_name = "FILE", conflicts_with = "request_type")]
    requests: Option<PathBuf>,

    /// File to read from. Defaults to stdin.
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
}

fn read_input(input: &Option<PathBuf>) -> Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut contents = String::new();
            std::io::stdin()
                .read_to_string(&mut contents)
                .context("Failed to read stdin")?;
            Ok(contents)
        }
    }
}

/// Parses the result of every request, keyed by cquery id.
fn parse_all(
    requests: &CqueryRequests,
    output: &str,
) -> Result<BTreeMap<String, CqueryResult>> {
    let results = CqueryResults::from_output(requests, output)?;
    results
        .iter()
        .map(|(key, raw)| {
            let result = key
                .request_type()
                .parse_result(raw.trim())
                .with_context(|| format!("Failed to parse the result of {key}"))?;
            Ok((key.cquery_id(), result))
        })
        .collect()
}

pub fn parse_cquery_main(args: Args) -> Result<()> {
    let input = read_input(&args.input)?;
    let json = match (&args.requests, args.request_type) {
        (Some(path), _) => {
            let requests = load_requests(path)?;
            serde_json::to_string_pretty(&parse_all(&requests, &input)?)?
        }
        (None, Some(request_type)) => {
            serde_json::to_string_pretty(&request_type.parse_result(input.trim())?)?
        }
        (None, None) => bail!("Either --request-type or --requests must be specified"),
    };
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp2build::bazel::cquery::ConfigKey;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: Args,
    }

    #[test]
    fn test_parse_args() -> Result<()> {
        let cli = Cli::try_parse_from(["parse-cquery", "--request-type", "getCcInfo"])?;
        assert_eq!(cli.args.request_type, Some(RequestType::GetCcInfo));
        assert!(Cli::try_parse_from(["parse-cquery"]).is_err());
        assert!(Cli::try_parse_from(["parse-cquery", "--request-type", "getNothing"]).is_err());
        Ok(())
    }

    #[test]
    fn test_parse_all() -> Result<()> {
        let mut requests = CqueryRequests::new();
        requests.queue("//a:out", RequestType::GetOutputFiles, ConfigKey::default());
        requests.queue("//a:prebuilt", RequestType::GetPrebuiltFileInfo, ConfigKey::default());

        let output = concat!(
            "@//a:out|target|linux>>a.txt, b.txt\n",
            "@//a:prebuilt|target|linux>>{\"Src\": \"x.conf\", \"Dir\": \"etc\", ",
            "\"Filename\": \"x.conf\", \"Installable\": true}\n",
        );
        let results = parse_all(&requests, output)?;
        assert_eq!(
            serde_json::to_value(&results)?,
            serde_json::json!({
                "@//a:out|target|linux": ["a.txt", "b.txt"],
                "@//a:prebuilt|target|linux": {
                    "Src": "x.conf",
                    "Dir": "etc",
                    "Filename": "x.conf",
                    "Installable": true,
                },
            })
        );
        Ok(())
    }

    #[test]
    fn test_parse_all_missing_result() {
        let mut requests = CqueryRequests::new();
        requests.queue("//a:out", RequestType::GetOutputFiles, ConfigKey::default());
        assert!(parse_all(&requests, "@//a:other|target|linux>>x\n").is_err());
    }
}
