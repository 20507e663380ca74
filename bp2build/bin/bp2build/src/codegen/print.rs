// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Printing of configurable attributes as Starlark expressions.

use std::collections::BTreeMap;

use crate::{
    bazel::{
        attribute::ScalarValue,
        configurability::{CONDITIONS_DEFAULT_CONFIG_KEY, CONDITIONS_DEFAULT_SELECT_KEY},
        AttributeError, BoolAttribute, Label, LabelAttribute, LabelList, LabelListAttribute,
        ScalarAttribute, StringAttribute, StringListAttribute, StringMapAttribute,
    },
    codegen::escape_string,
    starlark_fmt::{indention, print_bool, print_list, print_string_string_dict},
};

const BAZEL_NONE: &str = "None";
const EMPTY_BAZEL_LIST: &str = "[]";

/// Any attribute a Bazel target can carry.
#[derive(Clone, Debug, PartialEq)]
pub enum Attribute {
    Label(LabelAttribute),
    Bool(BoolAttribute),
    String(StringAttribute),
    LabelList(LabelListAttribute),
    StringList(StringListAttribute),
    StringMap(StringMapAttribute),
}

/// A value of a select entry or of the base value.
#[derive(Clone, Debug)]
struct SelectValue {
    /// The printed value, printing zero values as well. Empty if a zero value
    /// has no printed form.
    text: String,
    /// Whether the value is unset, or an unspecified list.
    is_zero: bool,
}

impl SelectValue {
    /// Prints the value, or nothing for zero values unless they are emitted.
    fn print(&self, emit_zero_values: bool) -> &str {
        if self.is_zero && !emit_zero_values {
            ""
        } else {
            &self.text
        }
    }

    fn specified(mut self) -> Self {
        self.is_zero = false;
        self
    }
}

/// Select key to value.
type Selects = BTreeMap<String, SelectValue>;

/// Formats scalar values as Starlark literals.
trait StarlarkLiteral {
    fn to_starlark(&self) -> String;
}

impl StarlarkLiteral for Label {
    fn to_starlark(&self) -> String {
        format!("\"{}\"", escape_string(&self.label))
    }
}

impl StarlarkLiteral for bool {
    fn to_starlark(&self) -> String {
        print_bool(*self)
    }
}

impl StarlarkLiteral for String {
    fn to_starlark(&self) -> String {
        format!("\"{}\"", escape_string(self))
    }
}

fn scalar_value<T: StarlarkLiteral>(value: Option<&T>) -> SelectValue {
    match value {
        Some(v) => SelectValue {
            text: v.to_starlark(),
            is_zero: false,
        },
        None => SelectValue {
            text: String::new(),
            is_zero: true,
        },
    }
}

fn quoted_list<'a, I>(items: I, indent: usize) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let quoted: Vec<String> = items
        .into_iter()
        .map(|s| format!("\"{}\"", escape_string(s)))
        .collect();
    print_list(&quoted, indent, |s| s.to_string())
}

fn label_list_value(list: &LabelList, indent: usize) -> SelectValue {
    SelectValue {
        text: quoted_list(list.includes.iter().map(|l| l.label.as_str()), indent),
        is_zero: !list.has_includes(),
    }
}

fn string_list_value(list: &[String], indent: usize) -> SelectValue {
    SelectValue {
        text: quoted_list(list.iter().map(|s| s.as_str()), indent),
        is_zero: list.is_empty(),
    }
}

fn print_select_entry(key: &str, value: &str, indent: usize) -> String {
    format!("{}\"{}\": {}", indention(indent + 1), key, value)
}

/// Prints a select expression. Returns an empty string if nothing needs to
/// be selected.
fn print_select_map(
    selects: &Selects,
    default_value: &str,
    indent: usize,
    emit_zero_values: bool,
) -> String {
    let default = selects.get(CONDITIONS_DEFAULT_SELECT_KEY);
    let default_is_zero = default.map_or(true, |v| v.is_zero);

    let mut entries = String::new();
    for (key, value) in selects {
        if key == CONDITIONS_DEFAULT_SELECT_KEY {
            continue;
        }
        // Empty values are only noted when they differ from the default.
        if value.is_zero && !emit_zero_values && default_is_zero {
            continue;
        }
        if value.text.is_empty() {
            continue;
        }
        entries.push_str(&print_select_entry(key, &value.text, indent));
        entries.push_str(",\n");
    }

    if entries.is_empty() {
        return default
            .map(|v| v.print(emit_zero_values).to_string())
            .unwrap_or_default();
    }

    let default_text = default
        .map(|v| v.print(emit_zero_values))
        .filter(|s| !s.is_empty())
        .unwrap_or(default_value);
    format!(
        "select({{\n{}{},\n{}}})",
        entries,
        print_select_entry(CONDITIONS_DEFAULT_SELECT_KEY, default_text, indent),
        indention(indent)
    )
}

fn append_selects(base: String, select: String, prepend: bool) -> String {
    match (base.is_empty(), select.is_empty()) {
        (_, true) => base,
        (true, false) => select,
        (false, false) if prepend => format!("{select} + {base}"),
        (false, false) => format!("{base} + {select}"),
    }
}

fn print_scalar<T>(attr: &ScalarAttribute<T>, indent: usize) -> Result<String, AttributeError>
where
    T: ScalarValue + StarlarkLiteral,
{
    let mut attr = attr.clone();
    attr.collapse()?;

    let mut base = scalar_value(attr.value.as_ref());
    if !attr.has_configurable_values() {
        return Ok(base.print(false).to_string());
    }

    let mut selects = Selects::new();
    for (axis, values) in &attr.configurable_values {
        for (config, value) in values {
            selects.insert(axis.select_key(config)?, scalar_value(value.as_ref()));
        }
    }
    // The base value becomes the default of the select.
    if !selects.contains_key(CONDITIONS_DEFAULT_SELECT_KEY) {
        selects.insert(CONDITIONS_DEFAULT_SELECT_KEY.to_string(), base);
        base = scalar_value::<T>(None);
    }

    let select = print_select_map(&selects, BAZEL_NONE, indent, false);
    Ok(append_selects(base.print(false).to_string(), select, false))
}

fn print_label_list(attr: &LabelListAttribute, indent: usize) -> Result<String, AttributeError> {
    let mut result = label_list_value(&attr.value, indent).print(false).to_string();

    for (axis, values) in &attr.configurable_values {
        if !values.values().any(|list| list.has_includes()) {
            continue;
        }
        let default_list = values
            .get(CONDITIONS_DEFAULT_CONFIG_KEY)
            .cloned()
            .unwrap_or_default();
        let emit_empty_list = attr.emit_empty_list || !default_list.includes.is_empty();

        let mut selects = Selects::new();
        for (config, list) in values {
            // Entries equal to the default are redundant.
            if config != CONDITIONS_DEFAULT_CONFIG_KEY && list.equals(&default_list) {
                continue;
            }
            let select_key = axis.select_key(config)?;
            if select_key == CONDITIONS_DEFAULT_SELECT_KEY
                || emit_empty_list
                || !list.includes.is_empty()
            {
                selects.insert(select_key, label_list_value(list, indent + 1));
            } else if !list.excludes.is_empty() {
                // Everything was excluded for this config; it still needs an
                // explicit empty list so that the default does not apply.
                selects.insert(select_key, string_list_value(&[], indent + 1).specified());
            }
        }
        if selects.is_empty() {
            continue;
        }
        let select = print_select_map(&selects, EMPTY_BAZEL_LIST, indent, attr.emit_empty_list);
        result = append_selects(result, select, attr.prepend);
    }

    let should_print_default =
        attr.force_specify_empty_list && (attr.value.has_includes() || attr.has_configurable_values());
    if result.is_empty() && should_print_default {
        return Ok(EMPTY_BAZEL_LIST.to_string());
    }
    Ok(result)
}

fn print_string_list(attr: &StringListAttribute, indent: usize) -> Result<String, AttributeError> {
    let mut result = string_list_value(&attr.value, indent).print(false).to_string();
    if !attr.has_configurable_values() {
        return Ok(result);
    }
    for (axis, values) in &attr.configurable_values {
        let mut selects = Selects::new();
        for (config, list) in values {
            selects.insert(axis.select_key(config)?, string_list_value(list, indent + 1));
        }
        let select = print_select_map(&selects, EMPTY_BAZEL_LIST, indent, false);
        result = append_selects(result, select, attr.prepend);
    }
    Ok(result)
}

/// Prints an attribute as a Starlark expression at the given indentation
/// level. Returns an empty string if the attribute should not be printed at
/// all.
pub fn pretty_print_attribute(attr: &Attribute, indent: usize) -> Result<String, AttributeError> {
    match attr {
        Attribute::Label(attr) => print_scalar(attr, indent),
        Attribute::Bool(attr) => print_scalar(attr, indent),
        Attribute::String(attr) => print_scalar(attr, indent),
        Attribute::LabelList(attr) => print_label_list(attr, indent),
        Attribute::StringList(attr) => print_string_list(attr, indent),
        Attribute::StringMap(map) => Ok(if map.is_empty() {
            String::new()
        } else {
            print_string_string_dict(map, indent)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bazel::configurability::*;
    use crate::bazel::ConfigurationAxis;
    use pretty_assertions::assert_eq;

    fn labels(names: &[&str]) -> LabelList {
        LabelList::from_labels(names.iter().map(|n| Label::new(*n)).collect())
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_print_plain_values() -> Result<(), AttributeError> {
        assert_eq!(
            pretty_print_attribute(&Attribute::Bool(BoolAttribute::new(false)), 1)?,
            "False"
        );
        assert_eq!(
            pretty_print_attribute(&Attribute::String(StringAttribute::new("a\"b".to_string())), 1)?,
            r#""a\"b""#
        );
        assert_eq!(
            pretty_print_attribute(&Attribute::Label(LabelAttribute::default()), 1)?,
            ""
        );
        assert_eq!(
            pretty_print_attribute(
                &Attribute::LabelList(LabelListAttribute::new(labels(&[":a", ":b"]))),
                1
            )?,
            "[\n        \":a\",\n        \":b\",\n    ]"
        );
        assert_eq!(
            pretty_print_attribute(&Attribute::StringList(StringListAttribute::default()), 1)?,
            ""
        );
        Ok(())
    }

    #[test]
    fn test_print_scalar_select() -> Result<(), AttributeError> {
        let mut attr = StringAttribute::default();
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM64, Some("libf.so".to_string()))?;
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM, Some("libg.so".to_string()))?;
        assert_eq!(
            pretty_print_attribute(&Attribute::String(attr), 1)?,
            r#"select({
        "//build/bazel_common_rules/platforms/arch:arm": "libg.so",
        "//build/bazel_common_rules/platforms/arch:arm64": "libf.so",
        "//conditions:default": None,
    })"#
        );
        Ok(())
    }

    #[test]
    fn test_print_scalar_select_uses_base_as_default() -> Result<(), AttributeError> {
        let mut attr = BoolAttribute::new(true);
        attr.set_select_value(&ConfigurationAxis::OS, OS_DARWIN, Some(false))?;
        assert_eq!(
            pretty_print_attribute(&Attribute::Bool(attr), 1)?,
            r#"select({
        "//build/bazel_common_rules/platforms/os:darwin": False,
        "//conditions:default": True,
    })"#
        );
        Ok(())
    }

    #[test]
    fn test_print_scalar_collapses_axes() -> Result<(), AttributeError> {
        let mut attr = LabelAttribute::default();
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM64, Some(Label::new(":arm64")))?;
        attr.set_select_value(&ConfigurationAxis::OS, OS_DARWIN, Some(Label::new(":darwin")))?;
        assert_eq!(
            pretty_print_attribute(&Attribute::Label(attr), 0)?,
            r#"select({
    "//build/bazel_common_rules/platforms/os_arch:android_arm64": ":arm64",
    "//build/bazel_common_rules/platforms/os_arch:darwin_arm64": ":arm64",
    "//build/bazel_common_rules/platforms/os_arch:darwin_x86_64": ":darwin",
    "//build/bazel_common_rules/platforms/os_arch:linux_bionic_arm64": ":arm64",
    "//conditions:default": None,
})"#
        );
        Ok(())
    }

    #[test]
    fn test_print_label_list_selects() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::new(labels(&["base.c"]));
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM, labels(&["arm.c"]))?;
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_X86, labels(&["x86.c", "sse.c"]))?;
        attr.set_select_value(&ConfigurationAxis::OS, OS_ANDROID, labels(&["android.c"]))?;
        assert_eq!(
            pretty_print_attribute(&Attribute::LabelList(attr), 1)?,
            r#"["base.c"] + select({
        "//build/bazel_common_rules/platforms/arch:arm": ["arm.c"],
        "//build/bazel_common_rules/platforms/arch:x86": [
            "x86.c",
            "sse.c",
        ],
        "//conditions:default": [],
    }) + select({
        "//build/bazel_common_rules/platforms/os:android": ["android.c"],
        "//conditions:default": [],
    })"#
        );
        Ok(())
    }

    #[test]
    fn test_print_label_list_prepend_and_default() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::new(labels(&["base"]));
        attr.prepend = true;
        attr.set_select_value(&ConfigurationAxis::ARCH, ARCH_ARM, LabelList::specified_empty())?;
        attr.set_select_value(
            &ConfigurationAxis::ARCH,
            CONDITIONS_DEFAULT_CONFIG_KEY,
            labels(&["generic"]),
        )?;
        assert_eq!(
            pretty_print_attribute(&Attribute::LabelList(attr), 0)?,
            r#"select({
    "//build/bazel_common_rules/platforms/arch:arm": [],
    "//conditions:default": ["generic"],
}) + ["base"]"#
        );
        Ok(())
    }

    #[test]
    fn test_print_label_list_all_excluded_config() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::default();
        attr.set_select_value(&ConfigurationAxis::OS, OS_LINUX, labels(&["linux.c"]))?;
        let mut excluded = LabelList::default();
        excluded.excludes = vec![Label::new("x.c")];
        attr.set_select_value(&ConfigurationAxis::OS, OS_DARWIN, excluded)?;
        assert_eq!(
            pretty_print_attribute(&Attribute::LabelList(attr), 0)?,
            r#"select({
    "//build/bazel_common_rules/platforms/os:darwin": [],
    "//build/bazel_common_rules/platforms/os:linux_glibc": ["linux.c"],
    "//conditions:default": [],
})"#
        );
        Ok(())
    }

    #[test]
    fn test_print_label_list_specified_empty_config() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::default();
        let mut emptied = LabelList::specified_empty();
        emptied.excludes = vec![Label::new("x.c")];
        attr.set_select_value(&ConfigurationAxis::OS, OS_DARWIN, emptied)?;
        assert_eq!(
            pretty_print_attribute(&Attribute::LabelList(attr), 0)?,
            r#"select({
    "//build/bazel_common_rules/platforms/os:darwin": [],
    "//conditions:default": [],
})"#
        );
        Ok(())
    }

    #[test]
    fn test_print_label_list_force_specify_empty_list() -> Result<(), AttributeError> {
        let mut attr = LabelListAttribute::new(LabelList::specified_empty());
        attr.force_specify_empty_list = true;
        assert_eq!(pretty_print_attribute(&Attribute::LabelList(attr), 0)?, "[]");

        let mut attr = LabelListAttribute::default();
        attr.force_specify_empty_list = true;
        assert_eq!(pretty_print_attribute(&Attribute::LabelList(attr), 0)?, "");
        Ok(())
    }

    #[test]
    fn test_print_string_list_selects() -> Result<(), AttributeError> {
        let mut attr = StringListAttribute::new(strings(&["-Wall"]));
        attr.set_select_value(
            &ConfigurationAxis::product_variable(false, "debuggable"),
            "debuggable",
            strings(&["-DDEBUG"]),
        )?;
        attr.set_select_value(
            &ConfigurationAxis::product_variable(false, "debuggable"),
            CONDITIONS_DEFAULT_CONFIG_KEY,
            vec![],
        )?;
        assert_eq!(
            pretty_print_attribute(&Attribute::StringList(attr), 0)?,
            r#"["-Wall"] + select({
    "//build/bazel/product_config/config_settings:debuggable": ["-DDEBUG"],
    "//conditions:default": [],
})"#
        );
        Ok(())
    }

    #[test]
    fn test_print_string_map() -> Result<(), AttributeError> {
        let map: StringMapAttribute = [("//flag:a".to_string(), "on".to_string())].into();
        assert_eq!(
            pretty_print_attribute(&Attribute::StringMap(map), 0)?,
            "{\n    \"//flag:a\": \"on\",\n}"
        );
        assert_eq!(
            pretty_print_attribute(&Attribute::StringMap(StringMapAttribute::new()), 0)?,
            ""
        );
        Ok(())
    }
}
