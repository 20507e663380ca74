// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Helpers to print Starlark values with consistent indentation.

use std::collections::BTreeMap;

use itertools::Itertools;

const INDENT: usize = 4;

/// Returns the indentation string for the given nesting level.
pub fn indention(level: usize) -> String {
    " ".repeat(level * INDENT)
}

pub fn print_bool(item: bool) -> String {
    let s = if item { "True" } else { "False" };
    s.to_string()
}

/// Prints a list whose items are formatted by `format_item`. A list with a
/// single item is printed inline; longer lists print one item per line.
pub fn print_list<S, F>(items: &[S], indent_level: usize, format_item: F) -> String
where
    S: AsRef<str>,
    F: Fn(&str) -> String,
{
    match items {
        [] => "[]".to_string(),
        [item] => format!("[{}]", format_item(item.as_ref())),
        _ => {
            let inner_indent = indention(indent_level + 1);
            let lines = items
                .iter()
                .map(|item| format!("{}{},", inner_indent, format_item(item.as_ref())));
            std::iter::once("[".to_string())
                .chain(lines)
                .chain(std::iter::once(format!("{}]", indention(indent_level))))
                .join("\n")
        }
    }
}

fn quote_string(s: &str) -> String {
    if s.contains('"') {
        format!("'''{s}'''")
    } else {
        format!("\"{s}\"")
    }
}

/// Prints a list of strings or labels.
pub fn print_string_list<S: AsRef<str>>(items: &[S], indent_level: usize) -> String {
    print_list(items, indent_level, quote_string)
}

/// Prints a dict with string keys whose values are already formatted.
/// Entries are sorted.
pub fn print_dict(dict: &BTreeMap<String, String>, indent_level: usize) -> String {
    if dict.is_empty() {
        return "{}".to_string();
    }
    let inner_indent = indention(indent_level + 1);
    let items = dict
        .iter()
        .map(|(k, v)| format!("{inner_indent}\"{k}\": {v},"))
        .sorted()
        .join("\n");
    format!("{{\n{}\n{}}}", items, indention(indent_level))
}

pub fn print_string_list_dict(dict: &BTreeMap<String, Vec<String>>, indent_level: usize) -> String {
    let formatted = dict
        .iter()
        .map(|(k, v)| (k.clone(), print_string_list(v, indent_level + 1)))
        .collect();
    print_dict(&formatted, indent_level)
}

pub fn print_bool_dict(dict: &BTreeMap<String, bool>, indent_level: usize) -> String {
    let formatted = dict
        .iter()
        .map(|(k, v)| (k.clone(), print_bool(*v)))
        .collect();
    print_dict(&formatted, indent_level)
}

pub fn print_string_int_dict(dict: &BTreeMap<String, i64>, indent_level: usize) -> String {
    let formatted = dict
        .iter()
        .map(|(k, v)| (k.clone(), v.to_string()))
        .collect();
    print_dict(&formatted, indent_level)
}

pub fn print_string_string_dict(dict: &BTreeMap<String, String>, indent_level: usize) -> String {
    let formatted = dict
        .iter()
        .map(|(k, v)| (k.clone(), format!("\"{v}\"")))
        .collect();
    print_dict(&formatted, indent_level)
}
