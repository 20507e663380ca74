// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AllowlistData, Bp2BuildConfig};

/// Contradictory allowlist entries found while deciding whether a module is
/// converted.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AllowlistError {
    #[error("module {0} is in module_always_convert and also in module_type_always_convert")]
    AlwaysConvertedByNameAndType(String),
    #[error("module {0} cannot be in module_do_not_convert and also in module_always_convert")]
    DoNotConvertAndAlwaysConvert(String),
    #[error(
        "module {module} cannot be in module_always_convert as its directory '{dir}' \
         converts by default"
    )]
    RedundantAlwaysConvert { dir: String, module: String },
}

/// The facts about a module needed to decide its conversion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub module_type: String,
    /// Directory of the module, relative to the workspace root. The root is
    /// `.`.
    pub dir: String,
    /// Explicit opt-in or opt-out set on the module itself.
    #[serde(default)]
    pub bp2build_available: Option<bool>,
}

/// Lookup tables deciding which modules are converted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionAllowlist {
    default_config: Bp2BuildConfig,
    keep_existing_build_file: BTreeMap<String, bool>,
    module_always_convert: BTreeSet<String>,
    module_type_always_convert: BTreeSet<String>,
    module_do_not_convert: BTreeSet<String>,
}

fn extend_set<I, S>(set: &mut BTreeSet<String>, items: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    set.extend(items.into_iter().map(Into::into));
}

impl ConversionAllowlist {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn from_data(data: &AllowlistData) -> Self {
        Self::new()
            .with_default_config(data.default_config.clone())
            .with_keep_existing_build_file(data.keep_existing_build_file.clone())
            .with_module_always_convert(&data.module_always_convert)
            .with_module_type_always_convert(&data.module_type_always_convert)
            .with_module_do_not_convert(&data.module_do_not_convert)
    }

    pub fn with_default_config(mut self, config: Bp2BuildConfig) -> Self {
        self.default_config.extend(config);
        self
    }

    pub fn with_keep_existing_build_file(mut self, dirs: BTreeMap<String, bool>) -> Self {
        self.keep_existing_build_file.extend(dirs);
        self
    }

    pub fn with_module_always_convert<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_set(&mut self.module_always_convert, names);
        self
    }

    pub fn with_module_type_always_convert<I, S>(mut self, module_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_set(&mut self.module_type_always_convert, module_types);
        self
    }

    pub fn with_module_do_not_convert<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        extend_set(&mut self.module_do_not_convert, names);
        self
    }

    /// Returns whether modules in `dir` are converted by default, and the
    /// directory whose entry decided it.
    ///
    /// An entry for `dir` itself always applies. Otherwise the closest
    /// ancestor with a recursive entry applies. Without any applicable entry
    /// modules are not converted, and `dir` itself is returned.
    pub fn package_default(&self, dir: &str) -> (bool, String) {
        if let Some(entry) = self.default_config.get(dir) {
            return (entry.default_value(), dir.to_string());
        }
        let mut prefix = dir;
        while let Some((parent, _)) = prefix.rsplit_once('/') {
            prefix = parent;
            match self.default_config.get(prefix) {
                Some(entry) if entry.is_recursive() => {
                    return (entry.default_value(), prefix.to_string());
                }
                _ => {}
            }
        }
        (false, dir.to_string())
    }

    /// Whether the hand-written BUILD file in `dir` is kept instead of being
    /// replaced by a generated one.
    pub fn should_keep_existing_build_file_for_dir(&self, dir: &str) -> bool {
        if self.keep_existing_build_file.contains_key(dir) {
            return true;
        }
        self.keep_existing_build_file
            .iter()
            .filter(|(_, recursive)| **recursive)
            .any(|(prefix, _)| {
                dir.strip_prefix(prefix.as_str())
                    .map_or(false, |rest| rest.starts_with('/'))
            })
    }

    /// Decides whether the module is converted.
    pub fn should_convert(&self, module: &ModuleInfo) -> Result<bool, AllowlistError> {
        // Test modules declared at the top level opt in explicitly.
        if module.dir == "." && module.bp2build_available == Some(true) {
            return Ok(true);
        }

        let name_allowed = self.module_always_convert.contains(&module.name);
        let type_allowed = self
            .module_type_always_convert
            .contains(&module.module_type);
        if name_allowed && type_allowed {
            return Err(AllowlistError::AlwaysConvertedByNameAndType(
                module.name.clone(),
            ));
        }

        if self.module_do_not_convert.contains(&module.name) {
            if name_allowed {
                return Err(AllowlistError::DoNotConvertAndAlwaysConvert(
                    module.name.clone(),
                ));
            }
            return Ok(false);
        }

        let (package_default, _) = self.package_default(&module.dir);
        if package_default {
            if name_allowed {
                return Err(AllowlistError::RedundantAlwaysConvert {
                    dir: module.dir.clone(),
                    module: module.name.clone(),
                });
            }
            return Ok(module.bp2build_available.unwrap_or(true));
        }

        Ok(module
            .bp2build_available
            .unwrap_or(name_allowed || type_allowed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlists::ConversionConfigEntry::*;
    use anyhow::Result;

    fn config(entries: &[(&str, crate::allowlists::ConversionConfigEntry)]) -> Bp2BuildConfig {
        entries
            .iter()
            .map(|(dir, entry)| (dir.to_string(), *entry))
            .collect()
    }

    fn module(dir: &str, name: &str, module_type: &str) -> ModuleInfo {
        ModuleInfo {
            name: name.to_string(),
            module_type: module_type.to_string(),
            dir: dir.to_string(),
            bp2build_available: None,
        }
    }

    #[test]
    fn test_package_default() {
        let allowlist = ConversionAllowlist::new().with_default_config(config(&[
            ("a", DefaultTrueRecursively),
            ("a/b", DefaultFalse),
            ("a/c", DefaultFalseRecursively),
            ("d", DefaultTrue),
        ]));

        let cases = [
            ("a", true, "a"),
            ("a/x/y", true, "a"),
            ("a/b", false, "a/b"),
            // Non-recursive entries don't apply to subdirectories.
            ("a/b/x", true, "a"),
            ("a/c/x", false, "a/c"),
            ("d", true, "d"),
            ("d/x", false, "d/x"),
            ("e", false, "e"),
        ];
        for (dir, want, want_dir) in cases {
            assert_eq!(
                allowlist.package_default(dir),
                (want, want_dir.to_string()),
                "dir = {dir}"
            );
        }
    }

    #[test]
    fn test_should_keep_existing_build_file_for_dir() {
        let allowlist = ConversionAllowlist::new().with_keep_existing_build_file(BTreeMap::from([
            ("a".to_string(), true),
            ("b".to_string(), false),
        ]));
        assert!(allowlist.should_keep_existing_build_file_for_dir("a"));
        assert!(allowlist.should_keep_existing_build_file_for_dir("a/x"));
        assert!(!allowlist.should_keep_existing_build_file_for_dir("ab"));
        assert!(allowlist.should_keep_existing_build_file_for_dir("b"));
        assert!(!allowlist.should_keep_existing_build_file_for_dir("b/x"));
        assert!(!allowlist.should_keep_existing_build_file_for_dir("c"));
    }

    #[test]
    fn test_should_convert() -> Result<()> {
        let allowlist = ConversionAllowlist::new()
            .with_default_config(config(&[("on", DefaultTrueRecursively)]))
            .with_module_always_convert(["always"])
            .with_module_type_always_convert(["genrule"])
            .with_module_do_not_convert(["never"]);

        assert!(allowlist.should_convert(&module("on", "lib", "cc_library"))?);
        assert!(!allowlist.should_convert(&module("off", "lib", "cc_library"))?);
        assert!(allowlist.should_convert(&module("off", "always", "cc_library"))?);
        assert!(allowlist.should_convert(&module("off", "gen", "genrule"))?);
        assert!(!allowlist.should_convert(&module("on", "never", "cc_library"))?);
        assert!(!allowlist.should_convert(&module("on", "never", "genrule"))?);

        let opt_out = ModuleInfo {
            bp2build_available: Some(false),
            ..module("on", "lib", "cc_library")
        };
        assert!(!allowlist.should_convert(&opt_out)?);

        let opt_in = ModuleInfo {
            bp2build_available: Some(true),
            ..module("off", "lib", "cc_library")
        };
        assert!(allowlist.should_convert(&opt_in)?);

        let top_level_test = ModuleInfo {
            bp2build_available: Some(true),
            ..module(".", "never", "cc_test")
        };
        assert!(allowlist.should_convert(&top_level_test)?);
        Ok(())
    }

    #[test]
    fn test_should_convert_errors() {
        let allowlist = ConversionAllowlist::new()
            .with_default_config(config(&[("on", DefaultTrue)]))
            .with_module_always_convert(["both", "conflict", "redundant"])
            .with_module_type_always_convert(["genrule"])
            .with_module_do_not_convert(["conflict"]);

        assert_eq!(
            allowlist.should_convert(&module("off", "both", "genrule")),
            Err(AllowlistError::AlwaysConvertedByNameAndType(
                "both".to_string()
            ))
        );
        assert_eq!(
            allowlist.should_convert(&module("off", "conflict", "cc_library")),
            Err(AllowlistError::DoNotConvertAndAlwaysConvert(
                "conflict".to_string()
            ))
        );
        assert_eq!(
            allowlist.should_convert(&module("on", "redundant", "cc_library")),
            Err(AllowlistError::RedundantAlwaysConvert {
                dir: "on".to_string(),
                module: "redundant".to_string(),
            })
        );
    }

    #[test]
    fn test_builtin_tables() -> Result<()> {
        let allowlist = ConversionAllowlist::from_data(&AllowlistData::builtin()?);
        assert_eq!(allowlist.package_default("build/bazel/rules"), (true, "build/bazel".to_string()));
        assert!(allowlist.should_keep_existing_build_file_for_dir("build/bazel/rules"));
        assert!(!allowlist.should_keep_existing_build_file_for_dir("build/make/core/tasks"));
        Ok(())
    }
}
