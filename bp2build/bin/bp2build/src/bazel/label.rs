// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::{
    collections::{BTreeSet, HashSet},
    path::Path,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A Bazel label, relative or fully qualified.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub label: String,

    /// The name of the Soong module the label was derived from. Used to
    /// replace references to the module name with the label, e.g. in genrule
    /// commands. Handcrafted targets may map to a label that can't be derived
    /// from the module name, hence it is stored explicitly.
    #[serde(default)]
    pub original_module_name: String,
}

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            original_module_name: String::new(),
        }
    }

    pub fn with_original_module_name(
        label: impl Into<String>,
        original_module_name: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            original_module_name: original_module_name.into(),
        }
    }
}

/// A list of Bazel labels with excludes.
///
/// An unset include list is distinct from an explicitly empty one: the former
/// means the attribute is not specified at all, the latter that it is
/// specified as `[]`.
#[derive(Clone, Debug, Default)]
pub struct LabelList {
    pub includes: Vec<Label>,
    pub excludes: Vec<Label>,
    pub(crate) includes_specified: bool,
}

impl PartialEq for LabelList {
    fn eq(&self, other: &Self) -> bool {
        self.includes == other.includes && self.excludes == other.excludes
    }
}

impl Eq for LabelList {}

impl LabelList {
    pub fn from_labels(labels: Vec<Label>) -> Self {
        Self {
            includes: labels,
            excludes: Vec::new(),
            includes_specified: false,
        }
    }

    /// Creates a list from unqualified target names, e.g. for converters that
    /// generate several targets from one module.
    pub fn from_target_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self::from_labels(
            names
                .iter()
                .map(|name| Label::new(format!(":{}", name.as_ref())))
                .collect(),
        )
    }

    /// Returns a list whose includes are explicitly set to `[]`.
    pub fn specified_empty() -> Self {
        Self {
            includes_specified: true,
            ..Default::default()
        }
    }

    /// Marks the include list as specified even when it is empty.
    pub fn mark_specified(&mut self) {
        self.includes_specified = true;
    }

    /// Whether the include list is set, possibly to an empty list.
    pub fn has_includes(&self) -> bool {
        self.includes_specified || !self.includes.is_empty()
    }

    pub fn equals(&self, other: &LabelList) -> bool {
        self == other
    }

    pub fn is_nil(&self) -> bool {
        !self.has_includes() && self.excludes.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Returns the unique parent directories of all includes, sorted.
    pub fn unique_parent_directories(&self) -> Vec<String> {
        self.includes
            .iter()
            .map(|label| {
                match Path::new(&label.label).parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => {
                        parent.to_string_lossy().into_owned()
                    }
                    _ => ".".to_string(),
                }
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn add(&mut self, label: Option<&Label>) {
        if let Some(label) = label {
            self.includes.push(label.clone());
        }
    }

    pub fn add_exclude(&mut self, label: Option<&Label>) {
        if let Some(label) = label {
            self.excludes.push(label.clone());
        }
    }

    /// Appends the includes and excludes of `other`.
    pub fn append(&mut self, other: &LabelList) {
        self.includes.extend(other.includes.iter().cloned());
        self.excludes.extend(other.excludes.iter().cloned());
    }

    /// Splits the list in two by `predicate`, applied to includes and excludes
    /// alike. The first list holds the labels the predicate accepted.
    pub fn partition<F>(&self, mut predicate: F) -> (LabelList, LabelList)
    where
        F: FnMut(&Label) -> bool,
    {
        let mut predicated = LabelList::default();
        let mut unpredicated = LabelList::default();
        for include in &self.includes {
            if predicate(include) {
                predicated.add(Some(include));
            } else {
                unpredicated.add(Some(include));
            }
        }
        for exclude in &self.excludes {
            if predicate(exclude) {
                predicated.add_exclude(Some(exclude));
            } else {
                unpredicated.add_exclude(Some(exclude));
            }
        }
        (predicated, unpredicated)
    }
}

/// Deduplicates labels by their label string and sorts them.
pub fn unique_sorted_labels(labels: &[Label]) -> Vec<Label> {
    let mut unique = first_unique_labels(labels);
    unique.sort_by(|a, b| a.label.cmp(&b.label));
    unique
}

/// Keeps the first occurrence of each label string.
pub fn first_unique_labels(labels: &[Label]) -> Vec<Label> {
    let mut found = HashSet::with_capacity(labels.len());
    let mut unique = Vec::new();
    for label in labels {
        if found.insert(label.label.as_str()) {
            unique.push(label.clone());
        }
    }
    unique
}

pub fn first_unique_label_list(list: &LabelList) -> LabelList {
    LabelList {
        includes: first_unique_labels(&list.includes),
        excludes: first_unique_labels(&list.excludes),
        includes_specified: false,
    }
}

pub fn unique_sorted_label_list(list: &LabelList) -> LabelList {
    LabelList {
        includes: unique_sorted_labels(&list.includes),
        excludes: unique_sorted_labels(&list.excludes),
        includes_specified: false,
    }
}

/// Returns the strings of `haystack` not in `needle`, in order.
pub fn subtract_strings(haystack: &[String], needle: &[String]) -> Vec<String> {
    let needle: HashSet<&String> = needle.iter().collect();
    haystack
        .iter()
        .filter(|s| !needle.contains(s))
        .cloned()
        .collect()
}

/// Returns the labels of `haystack` not in `needle`, in order.
pub fn subtract_labels(haystack: &[Label], needle: &[Label]) -> Vec<Label> {
    let needle: HashSet<&Label> = needle.iter().collect();
    haystack
        .iter()
        .filter(|l| !needle.contains(l))
        .cloned()
        .collect()
}

pub fn append_label_lists(a: &LabelList, b: &LabelList) -> LabelList {
    LabelList {
        includes: a.includes.iter().chain(&b.includes).cloned().collect_vec(),
        excludes: a.excludes.iter().chain(&b.excludes).cloned().collect_vec(),
        includes_specified: a.includes_specified,
    }
}

/// Subtracts the includes of `needle` from the includes of `haystack`. The
/// excludes of `haystack` are kept as they are.
pub fn subtract_label_list(haystack: &LabelList, needle: &LabelList) -> LabelList {
    LabelList {
        includes: subtract_labels(&haystack.includes, &needle.includes),
        excludes: haystack.excludes.clone(),
        includes_specified: false,
    }
}
