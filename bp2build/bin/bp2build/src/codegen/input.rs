// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! JSON description of targets to generate BUILD files for.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bazel::{
    attribute::ScalarValue, AttributeError, BazelTargetModuleProperties, ConfigurationAxis, Label,
    LabelList, LabelListAttribute, ScalarAttribute, StringListAttribute, StringMapAttribute,
};

use super::{Attribute, BazelTarget};

/// Per-axis, per-config values as they appear in JSON.
pub type SelectsInput<T> = BTreeMap<ConfigurationAxis, BTreeMap<String, T>>;

/// A target as read from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetInput {
    /// Name of the target. Empty for `package()` declarations.
    #[serde(default)]
    pub name: String,
    /// Package path relative to the workspace root. Empty for the root.
    #[serde(default)]
    pub package: String,
    pub rule_class: String,
    #[serde(default)]
    pub bzl_load_location: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeInput>,
}

/// A typed attribute value. Labels are written as strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeInput {
    Label {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        selects: SelectsInput<Option<String>>,
    },
    Bool {
        #[serde(default)]
        value: Option<bool>,
        #[serde(default)]
        selects: SelectsInput<Option<bool>>,
    },
    String {
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        selects: SelectsInput<Option<String>>,
    },
    LabelList {
        /// Unset leaves the base value unspecified, while `[]` specifies an
        /// empty list.
        #[serde(default)]
        value: Option<Vec<String>>,
        #[serde(default)]
        excludes: Vec<String>,
        #[serde(default)]
        selects: SelectsInput<Vec<String>>,
        #[serde(default)]
        force_specify_empty_list: bool,
        #[serde(default)]
        emit_empty_list: bool,
        #[serde(default)]
        prepend: bool,
    },
    StringList {
        #[serde(default)]
        value: Vec<String>,
        #[serde(default)]
        selects: SelectsInput<Vec<String>>,
        #[serde(default)]
        prepend: bool,
    },
    StringMap {
        #[serde(default)]
        value: StringMapAttribute,
    },
}

fn labels(names: &[String]) -> Vec<Label> {
    names.iter().map(|name| Label::new(name.as_str())).collect()
}

fn specified_label_list(names: &[String]) -> LabelList {
    let mut list = LabelList::from_labels(labels(names));
    list.mark_specified();
    list
}

fn scalar_attribute<I, T, F>(
    value: &Option<I>,
    selects: &SelectsInput<Option<I>>,
    convert: F,
) -> Result<ScalarAttribute<T>, AttributeError>
where
    T: ScalarValue,
    F: Fn(&I) -> T,
{
    let mut attr = ScalarAttribute::default();
    attr.set_value(value.as_ref().map(&convert));
    for (axis, configs) in selects {
        for (config, value) in configs {
            attr.set_select_value(axis, config, value.as_ref().map(&convert))?;
        }
    }
    Ok(attr)
}

impl AttributeInput {
    /// Builds the attribute, validating every axis and config.
    pub fn to_attribute(&self) -> Result<Attribute, AttributeError> {
        Ok(match self {
            AttributeInput::Label { value, selects } => {
                Attribute::Label(scalar_attribute(value, selects, |v| Label::new(v.as_str()))?)
            }
            AttributeInput::Bool { value, selects } => {
                Attribute::Bool(scalar_attribute(value, selects, |v| *v)?)
            }
            AttributeInput::String { value, selects } => {
                Attribute::String(scalar_attribute(value, selects, String::clone)?)
            }
            AttributeInput::LabelList {
                value,
                excludes,
                selects,
                force_specify_empty_list,
                emit_empty_list,
                prepend,
            } => {
                let mut base = match value {
                    Some(names) => specified_label_list(names),
                    None => LabelList::default(),
                };
                base.excludes = labels(excludes);
                let mut attr = LabelListAttribute::new(base);
                for (axis, configs) in selects {
                    for (config, names) in configs {
                        attr.set_select_value(axis, config, specified_label_list(names))?;
                    }
                }
                attr.force_specify_empty_list = *force_specify_empty_list;
                attr.emit_empty_list = *emit_empty_list;
                attr.prepend = *prepend;
                Attribute::LabelList(attr)
            }
            AttributeInput::StringList {
                value,
                selects,
                prepend,
            } => {
                let mut attr = StringListAttribute::new(value.clone());
                for (axis, configs) in selects {
                    for (config, list) in configs {
                        attr.set_select_value(axis, config, list.clone())?;
                    }
                }
                attr.prepend = *prepend;
                Attribute::StringList(attr)
            }
            AttributeInput::StringMap { value } => Attribute::StringMap(value.clone()),
        })
    }
}

impl TargetInput {
    pub fn to_target(&self) -> Result<BazelTarget, AttributeError> {
        let mut target = BazelTarget::new(
            self.name.clone(),
            self.package.clone(),
            BazelTargetModuleProperties {
                rule_class: self.rule_class.clone(),
                bzl_load_location: self.bzl_load_location.clone(),
            },
        );
        for (name, attr) in &self.attributes {
            target.set_attribute(name.clone(), attr.to_attribute()?);
        }
        Ok(target)
    }
}
