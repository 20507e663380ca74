// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Configurable attribute containers: a base value plus per-axis,
//! per-config override values.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Debug,
};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bazel::{
    configurability::{
        os_arch_string, ConfigurationAxis, ConfigurationType, CONDITIONS_DEFAULT_CONFIG_KEY,
        OS_TO_ARCH,
    },
    label::{subtract_strings, Label, LabelList},
    LabelListAttribute,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttributeError {
    #[error("cannot specify config with no_config, but got {0:?}")]
    ConfigOnNoConfigAxis(String),
    #[error("unknown {configuration_type} config: {config:?}")]
    UnknownConfig {
        configuration_type: ConfigurationType,
        config: String,
    },
    #[error("unknown configuration axis: {0:?}")]
    UnknownAxis(String),
    #[error("select key is unnecessary for the no_config axis")]
    NoSelectKey,
    #[error("unsupported configuration axis {axis} for {kind} attribute")]
    UnsupportedAxis {
        kind: &'static str,
        axis: ConfigurationAxis,
    },
    #[error("{kind} attribute could not be collapsed as it has two or more unrelated axes")]
    UnrelatedAxes { kind: &'static str },
    #[error("{kind} attribute still has {count} axes after collapsing")]
    CollapseIncomplete { kind: &'static str, count: usize },
    #[error("only one partition can store the remainder")]
    MultipleRemainderPartitions,
    #[error("{label:?} was found in multiple partitions: {first:?}, {second:?}")]
    MultiplePartitions {
        label: String,
        first: String,
        second: String,
    },
}

/// Validates `config` for `axis` and checks that the attribute kind supports
/// the axis at all.
pub(crate) fn check_select_axis(
    kind: &'static str,
    supports_axis: fn(ConfigurationType) -> bool,
    axis: &ConfigurationAxis,
    config: &str,
) -> Result<(), AttributeError> {
    axis.validate_config(config)?;
    let configuration_type = axis.configuration_type();
    if configuration_type != ConfigurationType::NoConfig && !supports_axis(configuration_type) {
        return Err(AttributeError::UnsupportedAxis {
            kind,
            axis: axis.clone(),
        });
    }
    Ok(())
}

/// A value type that can be stored in a [`ScalarAttribute`].
pub trait ScalarValue: Clone + Debug + PartialEq {
    /// Human readable name of the attribute kind, used in errors.
    const KIND: &'static str;

    /// Whether an unset per-config value is kept. A kept unset value means
    /// "use the base value".
    const KEEP_UNSET_SELECTS: bool = false;

    /// Whether product variable axes may be combined with the arch axis, as
    /// long as every product variable axis is arch-variant.
    const ALLOW_ARCH_VARIANT_PRODUCT_VARIABLES: bool = false;

    fn supports_axis(configuration_type: ConfigurationType) -> bool;
}

impl ScalarValue for Label {
    const KIND: &'static str = "label";
    const ALLOW_ARCH_VARIANT_PRODUCT_VARIABLES: bool = true;

    fn supports_axis(configuration_type: ConfigurationType) -> bool {
        use ConfigurationType::*;
        matches!(
            configuration_type,
            Arch | Os | OsArch | ProductVariables | OsAndInApex | SanitizersEnabled
        )
    }
}

impl ScalarValue for bool {
    const KIND: &'static str = "boolean";

    fn supports_axis(configuration_type: ConfigurationType) -> bool {
        use ConfigurationType::*;
        matches!(
            configuration_type,
            Arch | Os | OsArch | ProductVariables | OsAndInApex | SanitizersEnabled
        )
    }
}

impl ScalarValue for String {
    const KIND: &'static str = "string";
    const KEEP_UNSET_SELECTS: bool = true;

    fn supports_axis(configuration_type: ConfigurationType) -> bool {
        use ConfigurationType::*;
        matches!(
            configuration_type,
            Arch | Os | OsArch | ProductVariables | SanitizersEnabled
        )
    }
}

/// Per-axis, per-config values of a scalar attribute.
pub type ScalarSelectValues<T> = BTreeMap<ConfigurationAxis, BTreeMap<String, Option<T>>>;

/// An attribute holding a single, possibly configurable, value.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarAttribute<T> {
    pub value: Option<T>,
    pub configurable_values: ScalarSelectValues<T>,
}

pub type LabelAttribute = ScalarAttribute<Label>;
pub type BoolAttribute = ScalarAttribute<bool>;
pub type StringAttribute = ScalarAttribute<String>;

impl<T> Default for ScalarAttribute<T> {
    fn default() -> Self {
        Self {
            value: None,
            configurable_values: BTreeMap::new(),
        }
    }
}

impl<T: ScalarValue> ScalarAttribute<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Some(value),
            configurable_values: BTreeMap::new(),
        }
    }

    /// Sets the base, non-configured value.
    pub fn set_value(&mut self, value: Option<T>) {
        self.value = value;
    }

    pub fn set_select_value(
        &mut self,
        axis: &ConfigurationAxis,
        config: &str,
        value: Option<T>,
    ) -> Result<(), AttributeError> {
        check_select_axis(T::KIND, T::supports_axis, axis, config)?;
        if axis.configuration_type() == ConfigurationType::NoConfig {
            self.value = value;
        } else {
            self.insert_select_value(axis, config, value);
        }
        Ok(())
    }

    fn insert_select_value(&mut self, axis: &ConfigurationAxis, config: &str, value: Option<T>) {
        if value.is_none() && !T::KEEP_UNSET_SELECTS {
            if let Some(values) = self.configurable_values.get_mut(axis) {
                values.remove(config);
                if values.is_empty() {
                    self.configurable_values.remove(axis);
                }
            }
            return;
        }
        self.configurable_values
            .entry(axis.clone())
            .or_default()
            .insert(config.to_string(), value);
    }

    /// Returns the value for the given axis and config. Unset values and
    /// unknown configs both read as `None`.
    pub fn select_value(&self, axis: &ConfigurationAxis, config: &str) -> Option<&T> {
        if axis.configuration_type() == ConfigurationType::NoConfig {
            return self.value.as_ref();
        }
        self.configurable_values
            .get(axis)
            .and_then(|values| values.get(config))
            .and_then(|value| value.as_ref())
    }

    pub fn has_configurable_values(&self) -> bool {
        self.configurable_values.values().any(|v| !v.is_empty())
    }

    pub fn sorted_configuration_axes(&self) -> Vec<ConfigurationAxis> {
        self.configurable_values.keys().cloned().collect()
    }

    fn axis_types(&self) -> BTreeSet<ConfigurationType> {
        self.configurable_values
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(axis, _)| axis.configuration_type())
            .collect()
    }

    /// Reduces the configurable axes so that the attribute can be written as
    /// a single select.
    ///
    /// When both the os and arch axes are set, they are merged into the
    /// os_arch axis, with arch values taking precedence over os values.
    pub fn collapse(&mut self) -> Result<(), AttributeError> {
        let types = self.axis_types();
        let contains_os = types.contains(&ConfigurationType::Os);
        let contains_arch = types.contains(&ConfigurationType::Arch);
        let contains_os_arch = types.contains(&ConfigurationType::OsArch);
        let contains_product_variables = types.contains(&ConfigurationType::ProductVariables);

        if contains_product_variables && (contains_os || contains_arch || contains_os_arch) {
            let all_product_variables_are_arch_variant = self
                .configurable_values
                .keys()
                .filter(|axis| axis.configuration_type() == ConfigurationType::ProductVariables)
                .all(|axis| axis.arch_variant());
            let allowed = T::ALLOW_ARCH_VARIANT_PRODUCT_VARIABLES
                && contains_arch
                && all_product_variables_are_arch_variant;
            if !allowed {
                return Err(AttributeError::UnrelatedAxes { kind: T::KIND });
            }
        }

        if (contains_os && contains_arch) || (contains_os_arch && (contains_os || contains_arch)) {
            for (os, archs) in OS_TO_ARCH {
                for arch in *archs {
                    let os_arch = os_arch_string(os, arch);
                    if self
                        .select_value(&ConfigurationAxis::OS_ARCH, &os_arch)
                        .is_some()
                    {
                        continue;
                    }
                    let arch_value = self.select_value(&ConfigurationAxis::ARCH, arch).cloned();
                    let os_value = self.select_value(&ConfigurationAxis::OS, os).cloned();
                    // Arch takes precedence as the arch mutator runs after the
                    // os mutator.
                    if let Some(value) = arch_value.or(os_value) {
                        self.insert_select_value(&ConfigurationAxis::OS_ARCH, &os_arch, Some(value));
                    }
                }
            }
            self.configurable_values.remove(&ConfigurationAxis::ARCH);
            self.configurable_values.remove(&ConfigurationAxis::OS);

            if !T::ALLOW_ARCH_VARIANT_PRODUCT_VARIABLES && self.configurable_values.len() > 1 {
                return Err(AttributeError::CollapseIncomplete {
                    kind: T::KIND,
                    count: self.configurable_values.len(),
                });
            }
        } else if contains_product_variables {
            let base = self.value.clone();
            let mut used_base_value = false;
            for (axis, values) in self.configurable_values.iter_mut() {
                if axis.configuration_type() != ConfigurationType::ProductVariables {
                    continue;
                }
                for value in values.values_mut().filter(|v| v.is_none()) {
                    *value = base.clone();
                    used_base_value = true;
                }
            }
            if used_base_value {
                self.value = None;
            }
        }
        Ok(())
    }
}

impl BoolAttribute {
    /// Converts to a label list attribute where `false` and `true` map to the
    /// given lists. The base value becomes the default of each axis, and only
    /// configs whose list differs from it are kept.
    pub fn to_label_list_attribute(
        &self,
        false_val: &LabelList,
        true_val: &LabelList,
    ) -> Result<LabelListAttribute, AttributeError> {
        let get_label_list = |value: Option<bool>| match value {
            None => LabelList::default(),
            Some(true) => true_val.clone(),
            Some(false) => false_val.clone(),
        };

        let main_val = get_label_list(self.value);
        if !self.has_configurable_values() {
            return Ok(LabelListAttribute::new(main_val));
        }

        let mut collapsed = self.clone();
        collapsed.collapse()?;

        let mut result = LabelListAttribute::default();
        for (axis, values) in &collapsed.configurable_values {
            if values.is_empty() {
                continue;
            }
            for (config, value) in values {
                let val = get_label_list(*value);
                if !val.equals(&main_val) {
                    result.set_select_value(axis, config, val)?;
                }
            }
            result.set_select_value(axis, CONDITIONS_DEFAULT_CONFIG_KEY, main_val.clone())?;
        }
        Ok(result)
    }

    /// Converts to a string list attribute, generating each list with `f`.
    pub fn to_string_list_attribute<F>(&self, f: F) -> Result<StringListAttribute, AttributeError>
    where
        F: Fn(Option<bool>, &ConfigurationAxis, &str) -> Vec<String>,
    {
        let main_val = f(self.value, &ConfigurationAxis::NO_CONFIG, "");
        if !self.has_configurable_values() {
            return Ok(StringListAttribute::new(main_val));
        }

        let mut collapsed = self.clone();
        collapsed.collapse()?;

        let mut result = StringListAttribute::default();
        for (axis, values) in &collapsed.configurable_values {
            if values.is_empty() {
                continue;
            }
            for (config, value) in values {
                let val = f(*value, axis, config);
                if val != main_val {
                    result.set_select_value(axis, config, val)?;
                }
            }
            result.set_select_value(axis, CONDITIONS_DEFAULT_CONFIG_KEY, main_val.clone())?;
        }
        Ok(result)
    }
}

/// A list of strings with per-axis, per-config additions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringListAttribute {
    pub value: Vec<String>,
    pub configurable_values: BTreeMap<ConfigurationAxis, BTreeMap<String, Vec<String>>>,

    /// Emit the selects before the base value.
    pub prepend: bool,
}

impl StringListAttribute {
    const KIND: &'static str = "string_list";

    /// Creates an attribute with only a base value. The strings are not
    /// necessarily unique or sorted.
    pub fn new(value: Vec<String>) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    fn supports_axis(configuration_type: ConfigurationType) -> bool {
        use ConfigurationType::*;
        matches!(
            configuration_type,
            Arch | Os | OsArch | ProductVariables | OsAndInApex | ErrorProneDisabled
                | SanitizersEnabled
        )
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && !self.has_configurable_values()
    }

    pub fn has_configurable_values(&self) -> bool {
        self.configurable_values.values().any(|v| !v.is_empty())
    }

    /// Appends the base value and every per-config value of `other`.
    pub fn append(&mut self, other: &StringListAttribute) -> &mut Self {
        self.value.extend(other.value.iter().cloned());
        for (axis, other_values) in &other.configurable_values {
            let values = self.configurable_values.entry(axis.clone()).or_default();
            for (config, list) in other_values {
                values
                    .entry(config.clone())
                    .or_default()
                    .extend(list.iter().cloned());
            }
        }
        self
    }

    pub fn set_select_value(
        &mut self,
        axis: &ConfigurationAxis,
        config: &str,
        list: Vec<String>,
    ) -> Result<(), AttributeError> {
        check_select_axis(Self::KIND, Self::supports_axis, axis, config)?;
        if axis.configuration_type() == ConfigurationType::NoConfig {
            self.value = list;
        } else {
            self.configurable_values
                .entry(axis.clone())
                .or_default()
                .insert(config.to_string(), list);
        }
        Ok(())
    }

    pub fn select_value(&self, axis: &ConfigurationAxis, config: &str) -> &[String] {
        if axis.configuration_type() == ConfigurationType::NoConfig {
            return &self.value;
        }
        self.configurable_values
            .get(axis)
            .and_then(|values| values.get(config))
            .map(|list| list.as_slice())
            .unwrap_or_default()
    }

    pub fn sorted_configuration_axes(&self) -> Vec<ConfigurationAxis> {
        self.configurable_values.keys().cloned().collect()
    }

    /// Removes strings from per-config values that are already in the base
    /// value, dropping configs left empty.
    pub fn deduplicate_axes_from_base(&mut self) {
        let base = &self.value;
        for values in self.configurable_values.values_mut() {
            values.retain(|_, list| {
                *list = subtract_strings(list, base);
                !list.is_empty()
            });
        }
        self.configurable_values.retain(|_, values| !values.is_empty());
    }
}

lazy_static! {
    static ref PRODUCT_VARIABLE_SUBSTITUTION_PATTERN: Regex =
        Regex::new("%(d|s)").expect("valid regex");
}

/// Replaces `%s`/`%d` formatting in `s` with a `$(product_variable)` tag.
/// Returns the new string and whether anything changed.
pub fn try_variable_substitution(s: &str, product_variable: &str) -> (String, bool) {
    let replacement = format!("$({product_variable})");
    let substituted = PRODUCT_VARIABLE_SUBSTITUTION_PATTERN
        .replace_all(s, regex::NoExpand(&replacement))
        .into_owned();
    let changed = substituted != s;
    (substituted, changed)
}

pub fn try_variable_substitutions(items: &[String], product_variable: &str) -> (Vec<String>, bool) {
    let mut changed = false;
    let result = items
        .iter()
        .map(|s| {
            let (substituted, c) = try_variable_substitution(s, product_variable);
            changed |= c;
            substituted
        })
        .collect();
    (result, changed)
}

/// A map of strings. Only meant for `config_setting` flag values; Bazel rules
/// have no map attributes.
pub type StringMapAttribute = BTreeMap<String, String>;

/// The attributes of a `config_setting` target.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigSettingAttributes {
    /// Labels of custom string settings to their expected values.
    pub flag_values: StringMapAttribute,
    pub constraint_values: LabelListAttribute,
}

/// Rule metadata of a converted target.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BazelTargetModuleProperties {
    pub rule_class: String,

    /// Label of the bzl file defining the rule class. Empty for native rules.
    #[serde(default)]
    pub bzl_load_location: String,
}
