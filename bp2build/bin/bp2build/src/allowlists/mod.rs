// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Tables deciding which modules and directories are converted to Bazel.
//!
//! The built-in tables are compiled into the binary from
//! `data/allowlists.toml`. Additional TOML files with the same schema can be
//! layered on top of them with [`AllowlistData::merge`].

mod conversion;
mod mixed_builds;
mod priority;

pub use conversion::*;
pub use mixed_builds::*;
pub use priority::*;

use std::{collections::BTreeMap, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::instrument;

const BUILTIN_ALLOWLISTS: &str = include_str!("data/allowlists.toml");

/// How modules of a directory default their conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversionConfigEntry {
    /// Modules in the directory and its subdirectories are converted unless
    /// they opt out.
    DefaultTrueRecursively,
    /// Modules in the directory, but not its subdirectories, are converted
    /// unless they opt out.
    DefaultTrue,
    /// Modules in the directory, but not its subdirectories, are not
    /// converted unless they opt in.
    DefaultFalse,
    /// Modules in the directory and its subdirectories are not converted
    /// unless they opt in.
    DefaultFalseRecursively,
}

impl ConversionConfigEntry {
    pub fn default_value(self) -> bool {
        matches!(self, Self::DefaultTrue | Self::DefaultTrueRecursively)
    }

    pub fn is_recursive(self) -> bool {
        matches!(
            self,
            Self::DefaultTrueRecursively | Self::DefaultFalseRecursively
        )
    }
}

/// Directory path to its conversion default.
pub type Bp2BuildConfig = BTreeMap<String, ConversionConfigEntry>;

/// Modules built by Bazel in mixed builds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixedBuildsData {
    #[serde(default)]
    pub prod_enabled: Vec<String>,
    #[serde(default)]
    pub staging_enabled: Vec<String>,
    /// Libraries shared across APEXes. Only enabled for modules within an
    /// APEX.
    #[serde(default)]
    pub prod_dcla_enabled: Vec<String>,
    #[serde(default)]
    pub staging_dcla_enabled: Vec<String>,
}

/// The allowlist tables as stored in TOML.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowlistData {
    #[serde(default)]
    pub module_always_convert: Vec<String>,
    #[serde(default)]
    pub module_type_always_convert: Vec<String>,
    #[serde(default)]
    pub module_do_not_convert: Vec<String>,
    #[serde(default)]
    pub mixed_builds: MixedBuildsData,
    /// Module type prefixes that take long to build.
    #[serde(default)]
    pub huge_module_type_prefixes: BTreeMap<String, Priority>,
    /// Directories whose hand-written BUILD files are kept, to whether the
    /// rule applies to subdirectories as well.
    #[serde(default)]
    pub keep_existing_build_file: BTreeMap<String, bool>,
    #[serde(default)]
    pub default_config: Bp2BuildConfig,
}

fn extend_unique(list: &mut Vec<String>, other: &[String]) {
    let merged = list.iter().chain(other.iter()).unique().cloned().collect();
    *list = merged;
}

impl AllowlistData {
    /// Returns the tables compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_ALLOWLISTS).context("Failed to parse the built-in allowlists")
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads a TOML file to be merged on top of other tables.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load_overlay(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Merges `other` into `self`. Lists are extended without duplicates and
    /// map entries of `other` override those of `self`.
    pub fn merge(&mut self, other: &AllowlistData) {
        extend_unique(&mut self.module_always_convert, &other.module_always_convert);
        extend_unique(
            &mut self.module_type_always_convert,
            &other.module_type_always_convert,
        );
        extend_unique(&mut self.module_do_not_convert, &other.module_do_not_convert);

        let mixed_builds = &mut self.mixed_builds;
        extend_unique(
            &mut mixed_builds.prod_enabled,
            &other.mixed_builds.prod_enabled,
        );
        extend_unique(
            &mut mixed_builds.staging_enabled,
            &other.mixed_builds.staging_enabled,
        );
        extend_unique(
            &mut mixed_builds.prod_dcla_enabled,
            &other.mixed_builds.prod_dcla_enabled,
        );
        extend_unique(
            &mut mixed_builds.staging_dcla_enabled,
            &other.mixed_builds.staging_dcla_enabled,
        );

        self.huge_module_type_prefixes.extend(
            other
                .huge_module_type_prefixes
                .iter()
                .map(|(k, v)| (k.clone(), *v)),
        );
        self.keep_existing_build_file.extend(
            other
                .keep_existing_build_file
                .iter()
                .map(|(k, v)| (k.clone(), *v)),
        );
        self.default_config
            .extend(other.default_config.iter().map(|(k, v)| (k.clone(), *v)));
    }

    /// Returns the built-in tables with the given overlay files merged in
    /// order.
    pub fn load_with_overlays<P: AsRef<Path>>(overlays: &[P]) -> Result<Self> {
        let mut data = Self::builtin()?;
        for path in overlays {
            data.merge(&Self::load_overlay(path.as_ref())?);
        }
        Ok(data)
    }

    /// Serializes the tables back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
