// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Ninja scheduling weights for modules that take long to build.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Weight of modules taking more than half a minute to build.
pub const DEFAULT_PRIORITIZED_WEIGHT: u32 = 1000;
/// Weight of modules taking a few minutes to build.
pub const HIGH_PRIORITIZED_WEIGHT: u32 = 10 * DEFAULT_PRIORITIZED_WEIGHT;
/// Modules with more inputs than this are prioritized.
pub const INPUT_SIZE_THRESHOLD: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Default,
    High,
}

impl Priority {
    pub fn weight(self) -> u32 {
        match self {
            Priority::Default => DEFAULT_PRIORITIZED_WEIGHT,
            Priority::High => HIGH_PRIORITIZED_WEIGHT,
        }
    }
}

/// Computes the scheduling weight of a module, or `None` if the module is
/// not prioritized.
///
/// `input_size` counts both dependencies and action inputs. When several
/// prefixes match the module type, the longest one wins.
pub fn ninja_weight(
    huge_module_type_prefixes: &BTreeMap<String, Priority>,
    module_type: &str,
    input_size: usize,
) -> Option<u32> {
    let matched = huge_module_type_prefixes
        .iter()
        .filter(|(prefix, _)| module_type.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len());
    if let Some((_, priority)) = matched {
        return Some(priority.weight());
    }

    if input_size > INPUT_SIZE_THRESHOLD {
        let multiple = u32::try_from(input_size / INPUT_SIZE_THRESHOLD).unwrap_or(u32::MAX);
        let weight = multiple.saturating_mul(DEFAULT_PRIORITIZED_WEIGHT);
        return Some(weight.min(HIGH_PRIORITIZED_WEIGHT));
    }
    None
}

/// Formats weights as the `.ninja_weight_list` file, one `output,weight`
/// line per output.
pub fn format_weight_list(weights: &BTreeMap<String, u32>) -> String {
    weights
        .iter()
        .map(|(output, weight)| format!("{output},{weight}\n"))
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn prefixes() -> BTreeMap<String, Priority> {
        BTreeMap::from([
            ("rust_".to_string(), Priority::High),
            ("rust_ffi".to_string(), Priority::Default),
            ("art_".to_string(), Priority::Default),
        ])
    }

    #[test]
    fn test_ninja_weight_by_type() {
        let prefixes = prefixes();
        assert_eq!(ninja_weight(&prefixes, "rust_library", 0), Some(10000));
        assert_eq!(ninja_weight(&prefixes, "rust_ffi_static", 0), Some(1000));
        assert_eq!(ninja_weight(&prefixes, "art_cc_library", 1000), Some(1000));
        assert_eq!(ninja_weight(&prefixes, "cc_library", 0), None);
    }

    #[test]
    fn test_ninja_weight_by_input_size() {
        let prefixes = prefixes();
        assert_eq!(ninja_weight(&prefixes, "cc_library", 50), None);
        assert_eq!(ninja_weight(&prefixes, "cc_library", 51), Some(1000));
        assert_eq!(ninja_weight(&prefixes, "cc_library", 149), Some(2000));
        assert_eq!(ninja_weight(&prefixes, "cc_library", 100_000), Some(10000));
        assert_eq!(ninja_weight(&prefixes, "cc_library", usize::MAX), Some(10000));
    }

    #[test]
    fn test_format_weight_list() {
        let weights = BTreeMap::from([
            ("out/b.o".to_string(), 1000),
            ("out/a.o".to_string(), 10000),
        ]);
        assert_eq!(format_weight_list(&weights), "out/a.o,10000\nout/b.o,1000\n");
        assert_eq!(format_weight_list(&BTreeMap::new()), "");
    }

    proptest! {
        #[test]
        fn test_ninja_weight_is_bounded(input_size in any::<usize>()) {
            if let Some(weight) = ninja_weight(&BTreeMap::new(), "cc_library", input_size) {
                prop_assert!(weight >= DEFAULT_PRIORITIZED_WEIGHT);
                prop_assert!(weight <= HIGH_PRIORITIZED_WEIGHT);
            } else {
                prop_assert!(input_size <= INPUT_SIZE_THRESHOLD);
            }
        }
    }
}
