// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Requests for information about configured Bazel targets, and parsing of
//! the results printed by the generated cquery formatter program.

mod key;

pub use key::*;

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum_macros::EnumString;
use tera::{Context, Tera};
use tracing::instrument;

use crate::codegen::escape_string;

lazy_static! {
    static ref TEMPLATES: Tera = {
        let mut tera: Tera = Default::default();
        tera.add_raw_template(
            "buildroot.cquery",
            include_str!("templates/buildroot.cquery"),
        )
        .unwrap();
        tera
    };
}

#[derive(Debug, thiserror::Error)]
pub enum CqueryError {
    #[error("cannot parse cquery result '{raw}': {source}")]
    Parse {
        raw: String,
        source: serde_json::Error,
    },
    #[error("missing result for bazel target {0}")]
    MissingResult(String),
    #[error("no bazel response for {0}")]
    NoResponse(CqueryKey),
    #[error("failed to render the cquery formatter: {0}")]
    Render(#[from] tera::Error),
}

/// The kinds of information that can be requested about a configured target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    strum_macros::Display,
)]
pub enum RequestType {
    #[serde(rename = "getOutputFiles")]
    #[strum(serialize = "getOutputFiles")]
    GetOutputFiles,
    #[serde(rename = "getCcInfo")]
    #[strum(serialize = "getCcInfo")]
    GetCcInfo,
    #[serde(rename = "getApexInfo")]
    #[strum(serialize = "getApexInfo")]
    GetApexInfo,
    #[serde(rename = "getCcUnstrippedInfo")]
    #[strum(serialize = "getCcUnstrippedInfo")]
    GetCcUnstrippedInfo,
    #[serde(rename = "getPrebuiltFileInfo")]
    #[strum(serialize = "getPrebuiltFileInfo")]
    GetPrebuiltFileInfo,
}

impl RequestType {
    /// Returns the unique, alphanumeric name of the request type. It prefixes
    /// the names of the generated Starlark functions.
    pub fn name(self) -> &'static str {
        match self {
            Self::GetOutputFiles => "getOutputFiles",
            Self::GetCcInfo => "getCcInfo",
            Self::GetApexInfo => "getApexInfo",
            Self::GetCcUnstrippedInfo => "getCcUnstrippedInfo",
            Self::GetPrebuiltFileInfo => "getPrebuiltFileInfo",
        }
    }

    /// Returns the body of the Starlark function computing the result of the
    /// request. The function takes a configured `target` and its `id_string`,
    /// and returns a string. The body is not indented.
    pub fn starlark_function_body(self) -> &'static str {
        let body = match self {
            Self::GetOutputFiles => include_str!("starlark/getOutputFiles.star"),
            Self::GetCcInfo => include_str!("starlark/getCcInfo.star"),
            Self::GetApexInfo => include_str!("starlark/getApexInfo.star"),
            Self::GetCcUnstrippedInfo => include_str!("starlark/getCcUnstrippedInfo.star"),
            Self::GetPrebuiltFileInfo => include_str!("starlark/getPrebuiltFileInfo.star"),
        };
        body.trim_end_matches('\n')
    }

    /// Parses a raw result printed for this request type.
    pub fn parse_result(self, raw: &str) -> Result<CqueryResult, CqueryError> {
        Ok(match self {
            Self::GetOutputFiles => CqueryResult::OutputFiles(parse_output_files(raw)),
            Self::GetCcInfo => CqueryResult::CcInfo(parse_json(raw)?),
            Self::GetApexInfo => CqueryResult::ApexInfo(parse_json(raw)?),
            Self::GetCcUnstrippedInfo => CqueryResult::CcUnstrippedInfo(parse_json(raw)?),
            Self::GetPrebuiltFileInfo => CqueryResult::PrebuiltFileInfo(parse_json(raw)?),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct CcInfo {
    pub output_files: Vec<String>,
    pub cc_object_files: Vec<String>,
    pub cc_shared_library_files: Vec<String>,
    pub cc_static_library_files: Vec<String>,
    pub includes: Vec<String>,
    pub system_includes: Vec<String>,
    pub headers: Vec<String>,
    /// Archives owned by the target itself, a subset of `output_files`.
    pub root_static_archives: Vec<String>,
    /// Shared libraries created by the target itself, a subset of
    /// `output_files`.
    pub root_dynamic_libraries: Vec<String>,
    pub tidy_files: Vec<String>,
    pub toc_file: String,
    pub unstripped_output: String,
    pub abi_diff_files: Vec<String>,
    pub local_static_libs: Vec<String>,
    pub local_whole_static_libs: Vec<String>,
    pub local_shared_libs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApexInfo {
    pub signed_output: String,
    pub signed_compressed_output: String,
    pub unsigned_output: String,
    #[serde(rename = "provides_native_libs")]
    pub provides_libs: Vec<String>,
    #[serde(rename = "requires_native_libs")]
    pub requires_libs: Vec<String>,
    pub bundle_key_info: Vec<String>,
    pub container_key_info: Vec<String>,
    pub package_name: String,
    pub symbols_used_by_apex: String,
    pub java_symbols_used_by_apex: String,
    pub backing_libs: String,
    pub bundle_file: String,
    pub installed_files: String,
    pub tidy_files: Vec<String>,
    pub make_modules_to_install: Vec<String>,
    #[serde(rename = "files_info")]
    pub payload_files_info: Vec<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct CcUnstrippedInfo {
    pub output_file: String,
    pub unstripped_output: String,
    pub tidy_files: Vec<String>,
    pub local_static_libs: Vec<String>,
    pub local_whole_static_libs: Vec<String>,
    pub local_shared_libs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "PascalCase")]
pub struct PrebuiltFileInfo {
    pub src: String,
    pub dir: String,
    pub filename: String,
    pub installable: bool,
}

/// A parsed cquery result of any request type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CqueryResult {
    OutputFiles(Vec<String>),
    CcInfo(CcInfo),
    ApexInfo(ApexInfo),
    CcUnstrippedInfo(CcUnstrippedInfo),
    PrebuiltFileInfo(PrebuiltFileInfo),
}

/// Splits the comma-separated output file list. An empty string has no
/// output files.
pub fn parse_output_files(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(", ").map(|s| s.to_string()).collect()
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, CqueryError> {
    serde_json::from_str(raw).map_err(|source| CqueryError::Parse {
        raw: raw.to_string(),
        source,
    })
}

/// Splits the formatter output into cquery ids and raw results. Lines without
/// the `>>` separator are ignored.
pub fn split_cquery_output(output: &str) -> HashMap<&str, &str> {
    output
        .lines()
        .filter_map(|line| line.split_once(">>"))
        .collect()
}

#[derive(Serialize)]
struct RequestTemplateContext {
    name: &'static str,
    ids: Vec<String>,
    body: String,
}

#[derive(Serialize)]
struct CqueryTemplateContext {
    requests: Vec<RequestTemplateContext>,
}

fn indent(body: &str) -> String {
    body.split('\n').map(|line| format!("  {line}\n")).collect()
}

/// Generates the Starlark formatter program passed to `bazel cquery
/// --output=starlark`. Requests are grouped by type, in the order each type
/// is first seen.
#[instrument(skip_all)]
pub fn cquery_starlark_file_contents(requests: &CqueryRequests) -> Result<String, CqueryError> {
    let mut groups: Vec<RequestTemplateContext> = Vec::new();
    for key in requests.iter() {
        let request_type = key.request_type();
        let id = format!("\"{}\"", escape_string(&key.cquery_id()));
        match groups.iter_mut().find(|g| g.name == request_type.name()) {
            Some(group) => group.ids.push(id),
            None => groups.push(RequestTemplateContext {
                name: request_type.name(),
                ids: vec![id],
                body: indent(request_type.starlark_function_body()),
            }),
        }
    }

    let context = CqueryTemplateContext { requests: groups };
    Ok(TEMPLATES.render("buildroot.cquery", &Context::from_serialize(context)?)?)
}

/// Raw results of a cquery invocation, keyed by request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CqueryResults {
    results: BTreeMap<CqueryKey, String>,
}

impl CqueryResults {
    /// Matches the formatter output against the requests. Every request must
    /// have a result.
    #[instrument(skip_all)]
    pub fn from_output(requests: &CqueryRequests, output: &str) -> Result<Self, CqueryError> {
        let split = split_cquery_output(output);
        let mut results = BTreeMap::new();
        for key in requests.iter() {
            let id = key.cquery_id();
            let raw = split
                .get(id.as_str())
                .ok_or_else(|| CqueryError::MissingResult(id.clone()))?;
            results.insert(key.clone(), raw.to_string());
        }
        tracing::debug!("Matched {} cquery results", results.len());
        Ok(Self { results })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CqueryKey, &str)> {
        self.results.iter().map(|(k, v)| (k, v.as_str()))
    }

    fn raw_result(
        &self,
        label: &str,
        request_type: RequestType,
        config_key: &ConfigKey,
    ) -> Result<&str, CqueryError> {
        let key = CqueryKey::new(label, request_type, config_key.clone());
        match self.results.get(&key) {
            Some(raw) => Ok(raw.trim()),
            None => Err(CqueryError::NoResponse(key)),
        }
    }

    pub fn get_output_files(
        &self,
        label: &str,
        config_key: &ConfigKey,
    ) -> Result<Vec<String>, CqueryError> {
        let raw = self.raw_result(label, RequestType::GetOutputFiles, config_key)?;
        Ok(parse_output_files(raw))
    }

    pub fn get_cc_info(&self, label: &str, config_key: &ConfigKey) -> Result<CcInfo, CqueryError> {
        parse_json(self.raw_result(label, RequestType::GetCcInfo, config_key)?)
    }

    pub fn get_apex_info(
        &self,
        label: &str,
        config_key: &ConfigKey,
    ) -> Result<ApexInfo, CqueryError> {
        parse_json(self.raw_result(label, RequestType::GetApexInfo, config_key)?)
    }

    pub fn get_cc_unstripped_info(
        &self,
        label: &str,
        config_key: &ConfigKey,
    ) -> Result<CcUnstrippedInfo, CqueryError> {
        parse_json(self.raw_result(label, RequestType::GetCcUnstrippedInfo, config_key)?)
    }

    pub fn get_prebuilt_file_info(
        &self,
        label: &str,
        config_key: &ConfigKey,
    ) -> Result<PrebuiltFileInfo, CqueryError> {
        parse_json(self.raw_result(label, RequestType::GetPrebuiltFileInfo, config_key)?)
    }
}
