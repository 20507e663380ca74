// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::BTreeSet;

use strum_macros::{Display, EnumString};

use super::AllowlistData;

/// Which mixed build lists are in effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MixedBuildMode {
    Prod,
    /// Everything enabled in prod plus modules being staged.
    Staging,
}

/// Returns the modules built by Bazel in the given mode. `force_enabled`
/// modules are enabled regardless of the lists.
pub fn enabled_modules<S: AsRef<str>>(
    data: &AllowlistData,
    mode: MixedBuildMode,
    force_enabled: &[S],
) -> BTreeSet<String> {
    let lists = &data.mixed_builds;
    let mut modules: BTreeSet<String> = lists.prod_enabled.iter().cloned().collect();
    if mode == MixedBuildMode::Staging {
        modules.extend(lists.staging_enabled.iter().cloned());
    }
    modules.extend(force_enabled.iter().map(|s| s.as_ref().to_string()));
    modules
}

/// Returns the libraries built by Bazel when they are part of an APEX.
pub fn dcla_enabled_modules(data: &AllowlistData, mode: MixedBuildMode) -> BTreeSet<String> {
    let lists = &data.mixed_builds;
    let mut modules: BTreeSet<String> = lists.prod_dcla_enabled.iter().cloned().collect();
    if mode == MixedBuildMode::Staging {
        modules.extend(lists.staging_dcla_enabled.iter().cloned());
    }
    modules
}

/// Decides which modules are handed to Bazel in a mixed build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MixedBuildsContext {
    enabled_modules: BTreeSet<String>,
    disabled_modules: BTreeSet<String>,
    dcla_enabled_modules: BTreeSet<String>,
}

impl MixedBuildsContext {
    pub fn new<S: AsRef<str>>(
        data: &AllowlistData,
        mode: MixedBuildMode,
        force_enabled: &[S],
    ) -> Self {
        Self {
            enabled_modules: enabled_modules(data, mode, force_enabled),
            disabled_modules: BTreeSet::new(),
            dcla_enabled_modules: dcla_enabled_modules(data, mode),
        }
    }

    /// Disables modules even if they are enabled by a list.
    pub fn with_disabled_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_modules
            .extend(modules.into_iter().map(Into::into));
        self
    }

    /// Returns the enabled modules that are not disabled, sorted.
    pub fn enabled_modules(&self) -> Vec<&str> {
        self.enabled_modules
            .difference(&self.disabled_modules)
            .map(|s| s.as_str())
            .collect()
    }

    pub fn is_module_name_allowed(&self, name: &str, within_apex: bool) -> bool {
        if self.disabled_modules.contains(name) {
            return false;
        }
        if self.enabled_modules.contains(name) {
            return true;
        }
        within_apex && self.dcla_enabled_modules.contains(name)
    }
}
