// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::BTreeMap;

use crate::bazel::{
    attribute::check_select_axis,
    configurability::{
        ConfigurationAxis, ConfigurationType, CONDITIONS_DEFAULT_CONFIG_KEY, OS_ANDROID,
    },
    label::{
        append_label_lists, first_unique_label_list, subtract_label_list, Label, LabelList,
    },
    AttributeError, LabelAttribute,
};

/// A list of labels with per-axis, per-config additions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelListAttribute {
    pub value: LabelList,
    pub configurable_values: BTreeMap<ConfigurationAxis, BTreeMap<String, LabelList>>,

    /// Emit `[]` when the list is empty, even if it was never specified.
    pub force_specify_empty_list: bool,

    /// Emit empty per-config lists instead of leaving them out of the select.
    pub emit_empty_list: bool,

    /// Emit the selects before the base value.
    pub prepend: bool,
}

impl LabelListAttribute {
    const KIND: &'static str = "label_list";

    pub fn new(value: LabelList) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    /// Every axis is supported for label lists.
    fn supports_axis(_: ConfigurationType) -> bool {
        true
    }

    pub fn set_value(&mut self, value: LabelList) {
        self.value = value;
    }

    /// Sets the list for a config. Setting a nil list removes the entry.
    pub fn set_select_value(
        &mut self,
        axis: &ConfigurationAxis,
        config: &str,
        list: LabelList,
    ) -> Result<(), AttributeError> {
        check_select_axis(Self::KIND, Self::supports_axis, axis, config)?;
        if axis.configuration_type() == ConfigurationType::NoConfig {
            self.value = list;
            return Ok(());
        }
        if list.is_nil() {
            if let Some(values) = self.configurable_values.get_mut(axis) {
                values.remove(config);
                if values.is_empty() {
                    self.configurable_values.remove(axis);
                }
            }
        } else {
            self.configurable_values
                .entry(axis.clone())
                .or_default()
                .insert(config.to_string(), list);
        }
        Ok(())
    }

    pub fn select_value(&self, axis: &ConfigurationAxis, config: &str) -> LabelList {
        if axis.configuration_type() == ConfigurationType::NoConfig {
            return self.value.clone();
        }
        self.configurable_values
            .get(axis)
            .and_then(|values| values.get(config))
            .cloned()
            .unwrap_or_default()
    }

    pub fn sorted_configuration_axes(&self) -> Vec<ConfigurationAxis> {
        self.configurable_values.keys().cloned().collect()
    }

    /// Appends the base value and every per-config value of `other`.
    ///
    /// If either side forces empty lists to be specified, appending a
    /// non-nil list to a nil one yields a specified list.
    pub fn append(&mut self, other: &LabelListAttribute) {
        let force_specify_empty_list =
            self.force_specify_empty_list || other.force_specify_empty_list;
        if force_specify_empty_list && self.value.is_nil() && !other.value.is_nil() {
            self.value.mark_specified();
        }
        self.value.append(&other.value);

        for (axis, other_values) in &other.configurable_values {
            for (config, list) in other_values {
                let mut existing = self.select_value(axis, config);
                if force_specify_empty_list && existing.is_nil() && !list.is_nil() {
                    existing.mark_specified();
                }
                existing.append(list);
                if existing.is_nil() {
                    continue;
                }
                self.configurable_values
                    .entry(axis.clone())
                    .or_default()
                    .insert(config.clone(), existing);
            }
        }
    }

    /// Adds the base value and every per-config value of a label attribute.
    pub fn add(&mut self, label: &LabelAttribute) {
        self.value.add(label.value.as_ref());
        for (axis, values) in &label.configurable_values {
            for (config, value) in values {
                let Some(value) = value else {
                    continue;
                };
                self.configurable_values
                    .entry(axis.clone())
                    .or_default()
                    .entry(config.clone())
                    .or_default()
                    .add(Some(value));
            }
        }
    }

    /// Whether any axis has at least one config.
    pub fn has_configurable_values(&self) -> bool {
        self.configurable_values.values().any(|v| !v.is_empty())
    }

    /// Whether any config holds a non-nil list.
    pub fn has_axis_specific_values(&self) -> bool {
        self.configurable_values
            .values()
            .flat_map(|values| values.values())
            .any(|list| !list.is_nil())
    }

    pub fn is_empty(&self) -> bool {
        self.value.includes.is_empty()
            && !self
                .configurable_values
                .values()
                .flat_map(|values| values.values())
                .any(|list| !list.includes.is_empty())
    }

    pub fn is_nil(&self) -> bool {
        !self.value.has_includes() && !self.has_configurable_values()
    }

    /// Adds excludes for a config. Excluding on the no_config axis adds to
    /// the base value's excludes.
    pub fn exclude(
        &mut self,
        axis: &ConfigurationAxis,
        config: &str,
        list: &LabelList,
    ) -> Result<(), AttributeError> {
        let mut value = self.select_value(axis, config);
        value.excludes.extend(list.includes.iter().cloned());
        self.set_select_value(axis, config, value)
    }

    /// Turns excludes into includes of the other configs of the same axis.
    ///
    /// A label excluded for some config is removed from the base value and
    /// added to every other config of that axis instead, including the
    /// axis default.
    pub fn resolve_excludes(&mut self) {
        // Non-Android OSes carry their excludes into the os+in_apex axis,
        // where they apply on top of the in-APEX default includes.
        if let Some(in_apex_values) = self
            .configurable_values
            .get(&ConfigurationAxis::OS_AND_IN_APEX)
        {
            let in_apex_includes = in_apex_values
                .get(CONDITIONS_DEFAULT_CONFIG_KEY)
                .map(|list| list.includes.clone())
                .unwrap_or_default();
            let copied: Vec<(String, LabelList)> = self
                .configurable_values
                .get(&ConfigurationAxis::OS)
                .into_iter()
                .flatten()
                .filter(|(config, list)| *config != OS_ANDROID && !list.excludes.is_empty())
                .map(|(config, list)| {
                    (
                        config.clone(),
                        LabelList {
                            includes: in_apex_includes.clone(),
                            excludes: list.excludes.clone(),
                            includes_specified: false,
                        },
                    )
                })
                .collect();
            if let Some(in_apex_values) = self
                .configurable_values
                .get_mut(&ConfigurationAxis::OS_AND_IN_APEX)
            {
                in_apex_values.extend(copied);
            }
        }

        let axes = self.sorted_configuration_axes();
        for axis in axes {
            let Some(mut values) = self.configurable_values.remove(&axis) else {
                continue;
            };
            let base = self.value.clone();
            for list in values.values_mut() {
                self.value = subtract_label_list(
                    &self.value,
                    &LabelList::from_labels(list.excludes.clone()),
                );
                let all = append_label_lists(&base, list);
                *list = subtract_label_list(&all, &LabelList::from_labels(all.excludes.clone()));
            }

            for list in values.values_mut() {
                *list = subtract_label_list(list, &self.value);
            }

            let difference = subtract_label_list(&base, &self.value);
            let mut defaults = values
                .remove(CONDITIONS_DEFAULT_CONFIG_KEY)
                .unwrap_or_default();
            defaults.append(&difference);
            values.insert(
                CONDITIONS_DEFAULT_CONFIG_KEY.to_string(),
                first_unique_label_list(&defaults),
            );

            if values.values().any(|list| list.has_includes()) {
                self.configurable_values.insert(axis, values);
            }
        }
    }

    /// Splits the attribute in two by `predicate`, applied to every list. The
    /// first attribute holds the labels the predicate accepted.
    pub fn partition<F>(&self, mut predicate: F) -> (LabelListAttribute, LabelListAttribute)
    where
        F: FnMut(&Label) -> bool,
    {
        let (value, rest) = self.value.partition(&mut predicate);
        let mut predicated = LabelListAttribute::new(value);
        let mut unpredicated = LabelListAttribute::new(rest);
        for (axis, values) in &self.configurable_values {
            for (config, list) in values {
                let (value, rest) = list.partition(&mut predicate);
                insert_non_nil(&mut predicated, axis, config, value);
                insert_non_nil(&mut unpredicated, axis, config, rest);
            }
        }
        (predicated, unpredicated)
    }

    /// Returns a copy keeping the first occurrence of each label in every
    /// list.
    pub fn first_unique(&self) -> LabelListAttribute {
        self.map_lists(first_unique_label_list)
    }

    /// Returns a copy with the labels of `needle` removed from the base value
    /// and from every config.
    pub fn subtract(&self, needle: &LabelListAttribute) -> LabelListAttribute {
        let value = subtract_label_list(&self.value, &needle.value);
        let mut result = LabelListAttribute::new(value);
        for (axis, values) in &self.configurable_values {
            for (config, list) in values {
                let needle_list = needle.select_value(axis, config);
                insert_non_nil(
                    &mut result,
                    axis,
                    config,
                    subtract_label_list(list, &needle_list),
                );
            }
        }
        result
    }

    fn map_lists<F>(&self, f: F) -> LabelListAttribute
    where
        F: Fn(&LabelList) -> LabelList,
    {
        let mut result = LabelListAttribute::new(f(&self.value));
        for (axis, values) in &self.configurable_values {
            for (config, list) in values {
                insert_non_nil(&mut result, axis, config, f(list));
            }
        }
        result
    }
}

fn insert_non_nil(
    attr: &mut LabelListAttribute,
    axis: &ConfigurationAxis,
    config: &str,
    list: LabelList,
) {
    if list.is_nil() {
        return;
    }
    attr.configurable_values
        .entry(axis.clone())
        .or_default()
        .insert(config.to_string(), list);
}

/// Maps a label to a new label string, or `None` if the label is not part of
/// the partition.
pub type LabelMapper = Box<dyn Fn(&Label) -> Option<String>>;

/// Describes which labels belong to a partition.
#[derive(Default)]
pub struct LabelPartition {
    /// Labels ending with any of these suffixes belong to the partition.
    pub extensions: Vec<String>,
    pub label_mapper: Option<LabelMapper>,

    /// Whether labels matching no other partition belong here.
    pub keep_remainder: bool,
}

impl LabelPartition {
    pub fn with_extensions<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.as_ref().to_string()).collect(),
            ..Default::default()
        }
    }

    /// Returns the label as it should appear in the partition, if it belongs
    /// there, and whether it was mapped to a new label.
    fn filter(&self, label: &Label) -> Option<(Label, bool)> {
        if self
            .extensions
            .iter()
            .any(|ext| label.label.ends_with(ext.as_str()))
        {
            return Some((label.clone(), false));
        }
        let mapper = self.label_mapper.as_ref()?;
        let new_label = mapper(label)?;
        Some((
            Label::with_original_module_name(new_label, label.original_module_name.clone()),
            true,
        ))
    }
}

/// Partitions keyed by name.
pub type LabelPartitions = BTreeMap<String, LabelPartition>;

fn partition_label_list(
    list: &LabelList,
    partitions: &LabelPartitions,
    remainder: Option<&str>,
) -> Result<BTreeMap<String, LabelList>, AttributeError> {
    let mut result: BTreeMap<String, LabelList> = BTreeMap::new();
    for label in &list.includes {
        let mut kept_in: Option<&str> = None;
        let mut found = false;
        for (name, partition) in partitions {
            let Some((new_label, mapped)) = partition.filter(label) else {
                continue;
            };
            found = true;
            if !mapped {
                if let Some(first) = kept_in {
                    return Err(AttributeError::MultiplePartitions {
                        label: label.label.clone(),
                        first: first.to_string(),
                        second: name.clone(),
                    });
                }
                kept_in = Some(name.as_str());
            }
            result
                .entry(name.clone())
                .or_default()
                .add(Some(&new_label));
        }
        if let (false, Some(remainder)) = (found, remainder) {
            result
                .entry(remainder.to_string())
                .or_default()
                .add(Some(label));
        }
    }

    // Excludes apply to every partition.
    if !list.excludes.is_empty() {
        for name in partitions.keys() {
            result
                .entry(name.clone())
                .or_default()
                .excludes
                .extend(list.excludes.iter().cloned());
        }
    }
    Ok(result)
}

/// Splits a label list attribute into one attribute per partition. Every
/// partition name is present in the result, possibly with an empty
/// attribute.
pub fn partition_label_list_attribute(
    attr: &LabelListAttribute,
    partitions: &LabelPartitions,
) -> Result<BTreeMap<String, LabelListAttribute>, AttributeError> {
    let mut remainder = None;
    for (name, partition) in partitions {
        if partition.keep_remainder {
            if remainder.is_some() {
                return Err(AttributeError::MultipleRemainderPartitions);
            }
            remainder = Some(name.as_str());
        }
    }

    let mut result: BTreeMap<String, LabelListAttribute> = partitions
        .keys()
        .map(|name| (name.clone(), LabelListAttribute::default()))
        .collect();

    for (name, list) in partition_label_list(&attr.value, partitions, remainder)? {
        if let Some(partition_attr) = result.get_mut(&name) {
            partition_attr.set_value(list);
        }
    }
    for (axis, values) in &attr.configurable_values {
        for (config, list) in values {
            for (name, list) in partition_label_list(list, partitions, remainder)? {
                if let Some(partition_attr) = result.get_mut(&name) {
                    insert_non_nil(partition_attr, axis, config, list);
                }
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bazel::configurability::*;
    use pretty_assertions::assert_eq;

    fn list(names: &[&str]) -> LabelList {
        LabelList::from_labels(names.iter().map(|n| Label::new(*n)).collect())
    }

    fn list_with_excludes(names: &[&str], excludes: &[&str]) -> LabelList {
        let mut result = list(names);
        result.excludes = excludes.iter().map(|n| Label::new(*n)).collect();
        result
    }

    fn includes(list: &LabelList) -> Vec<&str> {
        list.includes.iter().map(|l| l.label.as_str()).collect()
    }

    #[test]
    fn test_set_nil_select_value_removes_entry() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::default();
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM, list(&["a"]))?;
        assert!(attr.has_configurable_values());
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM, LabelList::default())?;
        assert!(!attr.has_configurable_values());
        assert!(attr.is_nil());

        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM, LabelList::specified_empty())?;
        assert!(attr.has_configurable_values());
        assert!(attr.is_empty());
        assert!(!attr.is_nil());
        Ok(())
    }

    #[test]
    fn test_set_select_value_validates_config() {
        let mut attr = LabelListAttribute::default();
        assert!(attr
            .set_select_value(&ConfigurationAxis::OS, "plan9", list(&["a"]))
            .is_err());
        assert!(attr
            .set_select_value(&ConfigurationAxis::NO_CONFIG, "arm", list(&["a"]))
            .is_err());
    }

    #[test]
    fn test_append_with_force_specify_empty_list() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute {
            force_specify_empty_list: true,
            ..Default::default()
        };
        let mut other = LabelListAttribute::new(LabelList::specified_empty());
        other.set_select_value(&ConfigurationAxis::OS, OS_ANDROID, list(&["b"]))?;
        attr.append(&other);
        assert!(attr.value.has_includes());
        assert!(attr.value.includes.is_empty());
        assert_eq!(
            includes(&attr.select_value(&ConfigurationAxis::OS, OS_ANDROID)),
            vec!["b"]
        );

        let mut plain = LabelListAttribute::default();
        plain.append(&LabelListAttribute::new(LabelList::default()));
        assert!(plain.is_nil());
        Ok(())
    }

    #[test]
    fn test_add_label_attribute() -> Result<(), AttributeError> {
        let mut label = LabelAttribute::new(Label::new(":base"));
        label.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM64, Some(Label::new(":arm64")))?;

        let mut attr = LabelListAttribute::new(list(&[":a"]));
        attr.add(&label);
        assert_eq!(includes(&attr.value), vec![":a", ":base"]);
        assert_eq!(
            includes(&attr.select_value(&ConfigurationAxis::ARCH, ARCH_ARM64)),
            vec![":arm64"]
        );
        Ok(())
    }

    #[test]
    fn test_has_axis_specific_values() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::new(list(&["a"]));
        assert!(!attr.has_axis_specific_values());
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_X86, list(&["b"]))?;
        assert!(attr.has_axis_specific_values());
        Ok(())
    }

    #[test]
    fn test_resolve_excludes() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::new(list(&["a", "b", "c"]));
        attr.exclude(&ConfigurationAxis::ARCH, ARCH_ARM, &list(&["a"]))?;
        attr.set_select_value(
            &ConfigurationAxis::ARCH,
            ARCH_X86,
            list_with_excludes(&["d"], &["b"]),
        )?;
        attr.resolve_excludes();

        assert_eq!(includes(&attr.value), vec!["c"]);
        assert_eq!(
            includes(&attr.select_value(&ConfigurationAxis::ARCH, ARCH_ARM)),
            vec!["b"]
        );
        assert_eq!(
            includes(&attr.select_value(&ConfigurationAxis::ARCH, ARCH_X86)),
            vec!["a", "d"]
        );
        assert_eq!(
            includes(&attr.select_value(&ConfigurationAxis::ARCH, CONDITIONS_DEFAULT_CONFIG_KEY)),
            vec!["a", "b"]
        );
        Ok(())
    }

    #[test]
    fn test_resolve_excludes_drops_axes_without_includes() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::new(list(&["a"]));
        attr.exclude(&ConfigurationAxis::OS, OS_DARWIN, &list(&["z"]))?;
        attr.resolve_excludes();
        assert_eq!(includes(&attr.value), vec!["a"]);
        assert!(!attr.has_configurable_values());
        Ok(())
    }

    #[test]
    fn test_resolve_excludes_copies_os_excludes_into_in_apex_axis() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::default();
        attr.set_select_value(
            &ConfigurationAxis::OS_AND_IN_APEX,
            CONDITIONS_DEFAULT_CONFIG_KEY,
            list(&["libfoo"]),
        )?;
        attr.set_select_value(
            &ConfigurationAxis::OS_AND_IN_APEX,
            ANDROID_AND_IN_APEX,
            list(&["libfoo_stub"]),
        )?;
        attr.exclude(&ConfigurationAxis::OS, OS_DARWIN, &list(&["libfoo"]))?;
        attr.exclude(&ConfigurationAxis::OS, OS_ANDROID, &list(&["libbar"]))?;
        attr.resolve_excludes();

        assert!(attr
            .select_value(&ConfigurationAxis::OS_AND_IN_APEX, OS_DARWIN)
            .includes
            .is_empty());
        assert!(attr
            .configurable_values
            .get(&ConfigurationAxis::OS_AND_IN_APEX)
            .is_some_and(|v| v.contains_key(OS_DARWIN) && !v.contains_key(OS_ANDROID)));
        assert_eq!(
            includes(&attr.select_value(
                &ConfigurationAxis::OS_AND_IN_APEX,
                CONDITIONS_DEFAULT_CONFIG_KEY
            )),
            vec!["libfoo"]
        );
        Ok(())
    }

    #[test]
    fn test_partition() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::new(list(&["a.c", "b.h"]));
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM, list(&["c.h"]))?;
        let (headers, rest) = attr.partition(|l| l.label.ends_with(".h"));
        assert_eq!(includes(&headers.value), vec!["b.h"]);
        assert_eq!(includes(&rest.value), vec!["a.c"]);
        assert_eq!(
            includes(&headers.select_value(&ConfigurationAxis::ARCH, ARCH_ARM)),
            vec!["c.h"]
        );
        assert!(!rest.has_configurable_values());
        Ok(())
    }

    #[test]
    fn test_first_unique_and_subtract() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::new(list(&["a", "b", "a"]));
        attr.set_select_value(&ConfigurationAxis::OS, OS_LINUX, list(&["c", "c", "d"]))?;
        let unique = attr.first_unique();
        assert_eq!(includes(&unique.value), vec!["a", "b"]);
        assert_eq!(
            includes(&unique.select_value(&ConfigurationAxis::OS, OS_LINUX)),
            vec!["c", "d"]
        );

        let mut needle = LabelListAttribute::new(list(&["a"]));
        needle.set_select_value(&ConfigurationAxis::OS, OS_LINUX, list(&["c", "d"]))?;
        let result = unique.subtract(&needle);
        assert_eq!(includes(&result.value), vec!["b"]);
        assert!(result
            .select_value(&ConfigurationAxis::OS, OS_LINUX)
            .includes
            .is_empty());
        Ok(())
    }

    fn cc_partitions() -> LabelPartitions {
        let mut partitions = LabelPartitions::new();
        partitions.insert("c".to_string(), LabelPartition::with_extensions(&[".c"]));
        partitions.insert(
            "cpp".to_string(),
            LabelPartition {
                extensions: vec![".cpp".to_string()],
                keep_remainder: true,
                ..Default::default()
            },
        );
        partitions.insert(
            "proto".to_string(),
            LabelPartition {
                label_mapper: Some(Box::new(|label: &Label| {
                    label
                        .label
                        .strip_suffix(".proto")
                        .map(|stem| format!("{stem}_proto"))
                })),
                ..Default::default()
            },
        );
        partitions
    }

    #[test]
    fn test_partition_label_list_attribute() -> Result<(), AttributeError> {
        let mut source = list(&["a.c", "b.cpp", "c.cc", "d.proto"]);
        source.includes[3].original_module_name = "d".to_string();
        source.excludes = vec![Label::new("skip.c")];
        let mut attr = LabelListAttribute::new(source);
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM, list(&["arm.c"]))?;

        let result = partition_label_list_attribute(&attr, &cc_partitions())?;
        assert_eq!(
            result.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["c", "cpp", "proto"]
        );
        assert_eq!(includes(&result["c"].value), vec!["a.c"]);
        assert_eq!(includes(&result["cpp"].value), vec!["b.cpp", "c.cc"]);
        assert_eq!(includes(&result["proto"].value), vec!["d_proto"]);
        assert_eq!(result["proto"].value.includes[0].original_module_name, "d");
        for partition in result.values() {
            assert_eq!(partition.value.excludes, vec![Label::new("skip.c")]);
        }
        assert_eq!(
            includes(&result["c"].select_value(&ConfigurationAxis::ARCH, ARCH_ARM)),
            vec!["arm.c"]
        );
        assert!(!result["cpp"].has_configurable_values());
        Ok(())
    }

    #[test]
    fn test_partition_rejects_multiple_remainders() {
        let mut partitions = cc_partitions();
        partitions.insert(
            "other".to_string(),
            LabelPartition {
                keep_remainder: true,
                ..Default::default()
            },
        );
        assert!(matches!(
            partition_label_list_attribute(&LabelListAttribute::default(), &partitions),
            Err(AttributeError::MultipleRemainderPartitions)
        ));
    }

    #[test]
    fn test_partition_rejects_label_in_multiple_partitions() {
        let mut partitions = cc_partitions();
        partitions.insert("c2".to_string(), LabelPartition::with_extensions(&[".c"]));
        let attr = LabelListAttribute::new(list(&["a.c"]));
        assert_eq!(
            partition_label_list_attribute(&attr, &partitions).err(),
            Some(AttributeError::MultiplePartitions {
                label: "a.c".to_string(),
                first: "c".to_string(),
                second: "c2".to_string(),
            })
        );
    }
}
