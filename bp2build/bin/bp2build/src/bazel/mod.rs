// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Bazel-side data model: labels, configurable attributes and cquery.

pub mod attribute;
pub mod configurability;
pub mod cquery;
pub mod label;
pub mod label_list_attribute;

pub use attribute::{
    AttributeError, BazelTargetModuleProperties, BoolAttribute, ConfigSettingAttributes,
    LabelAttribute, ScalarAttribute, StringAttribute, StringListAttribute, StringMapAttribute,
};
pub use configurability::{ConfigurationAxis, ConfigurationType};
pub use label::{Label, LabelList};
pub use label_list_attribute::{
    partition_label_list_attribute, LabelListAttribute, LabelPartition, LabelPartitions,
};
