// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Generation of BUILD files from converted targets.

mod input;
mod print;

pub use input::*;
pub use print::*;

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use lazy_static::lazy_static;
use serde::Serialize;
use tera::{Context, Tera};
use tracing::instrument;

use crate::bazel::{AttributeError, BazelTargetModuleProperties};

pub static AUTOGENERATE_NOTICE: &str = "# AUTO-GENERATED FILE. DO NOT EDIT.\n\n";

/// Rule class of the `package()` declaration, which is emitted before other
/// targets.
const PACKAGE_RULE_CLASS: &str = "package";

lazy_static! {
    static ref TEMPLATES: Tera = {
        let mut tera: Tera = Default::default();
        tera.add_raw_template("BUILD.bazel", include_str!("templates/BUILD.bazel"))
            .unwrap();
        tera.autoescape_on(vec![".bazel"]);
        tera.set_escape_fn(escape_starlark_string);
        tera
    };
}

/// Escapes a string so that it is safe to be embedded in a Starlark literal
/// string quoted with double-quotes (`"`).
///
/// Use this function with [`Tera::set_escape_fn`] to generate Starlark files.
pub fn escape_starlark_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\"', "\\\"")
}

/// Escapes a string for a Starlark literal. Unlike
/// [`escape_starlark_string`], control characters are written as escape
/// sequences.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\"', "\\\"")
}

/// A target to be written to a BUILD file.
#[derive(Clone, Debug, PartialEq)]
pub struct BazelTarget {
    name: String,
    package: String,
    properties: BazelTargetModuleProperties,
    attributes: BTreeMap<String, Attribute>,
}

impl BazelTarget {
    pub fn new(
        name: impl Into<String>,
        package: impl Into<String>,
        properties: BazelTargetModuleProperties,
    ) -> Self {
        Self {
            name: name.into(),
            package: package.into(),
            properties,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.set_attribute(name, attr);
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, attr: Attribute) {
        self.attributes.insert(name.into(), attr);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_class(&self) -> &str {
        &self.properties.rule_class
    }

    /// Returns the package of the target. The root of the tree is `.`.
    pub fn package_name(&self) -> &str {
        if self.package.is_empty() {
            "."
        } else {
            &self.package
        }
    }

    /// Returns the fully qualified label of the target.
    pub fn label(&self) -> String {
        match self.package_name() {
            "." => format!("//:{}", self.name),
            package => format!("//{}:{}", package, self.name),
        }
    }

    /// Renders the target as a Starlark rule invocation. Attributes are sorted
    /// by name and left out when they print as nothing.
    pub fn content(&self) -> Result<String, AttributeError> {
        let mut content = format!("{}(\n", self.rule_class());
        if !self.name.is_empty() {
            content.push_str(&format!("    name = \"{}\",\n", escape_string(&self.name)));
        }
        for (name, attr) in &self.attributes {
            if name == "name" {
                continue;
            }
            let value = pretty_print_attribute(attr, 1)?;
            if !value.is_empty() {
                content.push_str(&format!("    {name} = {value},\n"));
            }
        }
        content.push(')');
        Ok(content)
    }
}

/// A `load()` statement of a BUILD file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BazelLoad {
    pub file: String,
    pub symbols: Vec<String>,
}

/// The targets of a single package.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BazelTargets(Vec<BazelTarget>);

impl BazelTargets {
    pub fn new(targets: Vec<BazelTarget>) -> Self {
        Self(targets)
    }

    pub fn push(&mut self, target: BazelTarget) {
        self.0.push(target);
    }

    pub fn iter(&self) -> impl Iterator<Item = &BazelTarget> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorts targets by name, keeping the package declaration first.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| {
            (a.rule_class() != PACKAGE_RULE_CLASS, &a.name)
                .cmp(&(b.rule_class() != PACKAGE_RULE_CLASS, &b.name))
        });
    }

    /// Returns the load statements needed by the targets, one per bzl file,
    /// with sorted and deduplicated symbols.
    pub fn load_statements(&self) -> Vec<BazelLoad> {
        let mut loads: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for target in &self.0 {
            let location = target.properties.bzl_load_location.as_str();
            if location.is_empty() {
                continue;
            }
            loads
                .entry(location)
                .or_default()
                .insert(target.rule_class());
        }
        loads
            .into_iter()
            .map(|(file, symbols)| BazelLoad {
                file: file.to_string(),
                symbols: symbols.into_iter().map(|s| s.to_string()).collect(),
            })
            .collect()
    }
}

#[derive(Serialize)]
struct BuildFileContext {
    loads: Vec<BazelLoad>,
    targets: Vec<String>,
}

/// Generates the contents of a BUILD file holding the given targets.
#[instrument(skip_all)]
pub fn generate_build_file(targets: &BazelTargets) -> Result<String> {
    let mut targets = targets.clone();
    targets.sort();

    let context = BuildFileContext {
        loads: targets.load_statements(),
        targets: targets
            .iter()
            .map(|target| target.content())
            .collect::<Result<_, _>>()?,
    };
    let mut contents = AUTOGENERATE_NOTICE.to_string();
    contents.push_str(&TEMPLATES.render("BUILD.bazel", &Context::from_serialize(context)?)?);
    tracing::debug!("Generated BUILD file with {} targets", targets.len());
    Ok(contents)
}
