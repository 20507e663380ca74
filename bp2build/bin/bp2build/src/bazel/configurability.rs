// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Configuration axes and the Bazel `select()` keys they map to.

use std::{collections::BTreeMap, fmt, str::FromStr};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

use crate::bazel::AttributeError;

pub const ARCH_ARM: &str = "arm";
pub const ARCH_ARM64: &str = "arm64";
pub const ARCH_RISCV64: &str = "riscv64";
pub const ARCH_X86: &str = "x86";
pub const ARCH_X86_64: &str = "x86_64";

pub const OS_ANDROID: &str = "android";
pub const OS_DARWIN: &str = "darwin";
pub const OS_LINUX: &str = "linux_glibc";
pub const OS_LINUX_MUSL: &str = "linux_musl";
pub const OS_LINUX_BIONIC: &str = "linux_bionic";
pub const OS_WINDOWS: &str = "windows";

pub const OS_ARCH_ANDROID_ARM: &str = "android_arm";
pub const OS_ARCH_ANDROID_ARM64: &str = "android_arm64";
pub const OS_ARCH_ANDROID_RISCV64: &str = "android_riscv64";
pub const OS_ARCH_ANDROID_X86: &str = "android_x86";
pub const OS_ARCH_ANDROID_X86_64: &str = "android_x86_64";
pub const OS_ARCH_DARWIN_ARM64: &str = "darwin_arm64";
pub const OS_ARCH_DARWIN_X86_64: &str = "darwin_x86_64";
pub const OS_ARCH_LINUX_X86: &str = "linux_glibc_x86";
pub const OS_ARCH_LINUX_X86_64: &str = "linux_glibc_x86_64";
pub const OS_ARCH_LINUX_MUSL_ARM: &str = "linux_musl_arm";
pub const OS_ARCH_LINUX_MUSL_ARM64: &str = "linux_musl_arm64";
pub const OS_ARCH_LINUX_MUSL_X86: &str = "linux_musl_x86";
pub const OS_ARCH_LINUX_MUSL_X86_64: &str = "linux_musl_x86_64";
pub const OS_ARCH_LINUX_BIONIC_ARM64: &str = "linux_bionic_arm64";
pub const OS_ARCH_LINUX_BIONIC_X86_64: &str = "linux_bionic_x86_64";
pub const OS_ARCH_WINDOWS_X86: &str = "windows_x86";
pub const OS_ARCH_WINDOWS_X86_64: &str = "windows_x86_64";

/// The config key of the default condition of a select, mirroring the
/// `conditions_default` key of Soong config variables.
pub const CONDITIONS_DEFAULT_CONFIG_KEY: &str = "conditions_default";

/// The Bazel select key of the default condition.
pub const CONDITIONS_DEFAULT_SELECT_KEY: &str = "//conditions:default";

pub const PRODUCT_VARIABLE_BAZEL_PACKAGE: &str = "//build/bazel/product_config/config_settings";

pub const ANDROID_AND_IN_APEX: &str = "android-in_apex";
pub const ANDROID_PLATFORM: &str = "system";
pub const UNBUNDLED_APP: &str = "unbundled_app";

pub const IN_APEX: &str = "in_apex";
pub const NON_APEX: &str = "non_apex";

pub const ERRORPRONE_DISABLED: &str = "errorprone_disabled";
pub const SANITIZERS_ENABLED: &str = "sanitizers_enabled";

const OS_ARCHS: &[&str] = &[
    OS_ARCH_ANDROID_ARM,
    OS_ARCH_ANDROID_ARM64,
    OS_ARCH_ANDROID_RISCV64,
    OS_ARCH_ANDROID_X86,
    OS_ARCH_ANDROID_X86_64,
    OS_ARCH_DARWIN_ARM64,
    OS_ARCH_DARWIN_X86_64,
    OS_ARCH_LINUX_X86,
    OS_ARCH_LINUX_X86_64,
    OS_ARCH_LINUX_MUSL_ARM,
    OS_ARCH_LINUX_MUSL_ARM64,
    OS_ARCH_LINUX_MUSL_X86,
    OS_ARCH_LINUX_MUSL_X86_64,
    OS_ARCH_LINUX_BIONIC_ARM64,
    OS_ARCH_LINUX_BIONIC_X86_64,
    OS_ARCH_WINDOWS_X86,
    OS_ARCH_WINDOWS_X86_64,
];

const ARCH_FEATURES: &[(&str, &[&str])] = &[
    (ARCH_ARM, &["neon"]),
    (ARCH_ARM64, &["dotprod"]),
    (ARCH_RISCV64, &[]),
    (
        ARCH_X86,
        &[
            "ssse3", "sse4", "sse4_1", "sse4_2", "aes_ni", "avx", "avx2", "avx512", "popcnt",
            "movbe",
        ],
    ),
    (
        ARCH_X86_64,
        &[
            "ssse3", "sse4", "sse4_1", "sse4_2", "aes_ni", "avx", "avx2", "avx512", "popcnt",
        ],
    ),
];

/// Returns every non-empty subset of `items`, in binary counting order of the
/// subset bitmask.
pub fn power_set_without_empty_set<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    let size = 1usize << items.len();
    (1..size)
        .map(|mask| {
            items
                .iter()
                .enumerate()
                .filter(|(j, _)| (mask >> j) & 1 == 1)
                .map(|(_, item)| item.clone())
                .collect()
        })
        .collect()
}

fn select_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .chain(std::iter::once((
            CONDITIONS_DEFAULT_CONFIG_KEY.to_string(),
            CONDITIONS_DEFAULT_SELECT_KEY.to_string(),
        )))
        .collect()
}

fn create_platform_arch_map() -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    for (arch, all_features) in ARCH_FEATURES {
        result.insert(
            arch.to_string(),
            format!("//build/bazel_common_rules/platforms/arch:{arch}"),
        );
        // Selecting on multiple active features needs every combination.
        for mut features in power_set_without_empty_set(all_features) {
            features.sort();
            let name = format!("{}-{}", arch, features.join("-"));
            let label = format!("//build/bazel/platforms/arch/variants:{name}");
            result.insert(name, label);
        }
    }
    result.insert(
        CONDITIONS_DEFAULT_CONFIG_KEY.to_string(),
        CONDITIONS_DEFAULT_SELECT_KEY.to_string(),
    );
    result
}

lazy_static! {
    static ref PLATFORM_ARCH_MAP: BTreeMap<String, String> = create_platform_arch_map();
    static ref PLATFORM_OS_MAP: BTreeMap<String, String> = select_map(&[
        (OS_ANDROID, "//build/bazel_common_rules/platforms/os:android"),
        (OS_DARWIN, "//build/bazel_common_rules/platforms/os:darwin"),
        (OS_LINUX, "//build/bazel_common_rules/platforms/os:linux_glibc"),
        (OS_LINUX_MUSL, "//build/bazel_common_rules/platforms/os:linux_musl"),
        (OS_LINUX_BIONIC, "//build/bazel_common_rules/platforms/os:linux_bionic"),
        (OS_WINDOWS, "//build/bazel_common_rules/platforms/os:windows"),
    ]);
    static ref PLATFORM_OS_ARCH_MAP: BTreeMap<String, String> = {
        let mut result: BTreeMap<String, String> = OS_ARCHS
            .iter()
            .map(|os_arch| {
                (
                    os_arch.to_string(),
                    format!("//build/bazel_common_rules/platforms/os_arch:{os_arch}"),
                )
            })
            .collect();
        result.insert(
            CONDITIONS_DEFAULT_CONFIG_KEY.to_string(),
            CONDITIONS_DEFAULT_SELECT_KEY.to_string(),
        );
        result
    };
    static ref OS_AND_IN_APEX_MAP: BTreeMap<String, String> = select_map(&[
        (ANDROID_AND_IN_APEX, "//build/bazel/rules/apex:android-in_apex"),
        (ANDROID_PLATFORM, "//build/bazel/rules/apex:system"),
        (UNBUNDLED_APP, "//build/bazel/rules/apex:unbundled_app"),
        (OS_DARWIN, "//build/bazel_common_rules/platforms/os:darwin"),
        (OS_LINUX, "//build/bazel_common_rules/platforms/os:linux_glibc"),
        (OS_LINUX_MUSL, "//build/bazel_common_rules/platforms/os:linux_musl"),
        (OS_LINUX_BIONIC, "//build/bazel_common_rules/platforms/os:linux_bionic"),
        (OS_WINDOWS, "//build/bazel_common_rules/platforms/os:windows"),
    ]);
    static ref IN_APEX_MAP: BTreeMap<String, String> = select_map(&[
        (IN_APEX, "//build/bazel/rules/apex:in_apex"),
        (NON_APEX, "//build/bazel/rules/apex:non_apex"),
    ]);
    static ref ERROR_PRONE_MAP: BTreeMap<String, String> = select_map(&[(
        ERRORPRONE_DISABLED,
        "//build/bazel/rules/java/errorprone:errorprone_globally_disabled"
    )]);
    static ref SANITIZERS_ENABLED_MAP: BTreeMap<String, String> = select_map(&[(
        SANITIZERS_ENABLED,
        "//build/bazel/rules/cc:sanitizers_enabled"
    )]);
}

/// Architectures supported by each OS.
pub const OS_TO_ARCH: &[(&str, &[&str])] = &[
    (
        OS_ANDROID,
        &[ARCH_ARM, ARCH_ARM64, ARCH_RISCV64, ARCH_X86, ARCH_X86_64],
    ),
    (OS_LINUX, &[ARCH_X86, ARCH_X86_64]),
    (OS_LINUX_MUSL, &[ARCH_X86, ARCH_X86_64]),
    (OS_DARWIN, &[ARCH_ARM64, ARCH_X86_64]),
    (OS_LINUX_BIONIC, &[ARCH_ARM64, ARCH_X86_64]),
    (OS_WINDOWS, &[ARCH_X86, ARCH_X86_64]),
];

/// Returns the config key of the os_arch axis for an OS and an architecture.
pub fn os_arch_string(os: &str, arch: &str) -> String {
    format!("{os}_{arch}")
}

/// The basic kinds of configuration. The declaration order is the order in
/// which selects are emitted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString, strum_macros::Display,
)]
pub enum ConfigurationType {
    #[strum(serialize = "no_config")]
    NoConfig,
    #[strum(serialize = "arch")]
    Arch,
    #[strum(serialize = "os")]
    Os,
    #[strum(serialize = "arch_os")]
    OsArch,
    #[strum(serialize = "product_variables")]
    ProductVariables,
    #[strum(serialize = "os_in_apex")]
    OsAndInApex,
    #[strum(serialize = "in_apex")]
    InApex,
    #[strum(serialize = "errorprone_disabled")]
    ErrorProneDisabled,
    #[strum(serialize = "sanitizers_enabled")]
    SanitizersEnabled,
}

impl ConfigurationType {
    /// Returns the map of known config keys to select keys, if the type has a
    /// closed set of keys.
    fn known_configs(self) -> Option<&'static BTreeMap<String, String>> {
        match self {
            Self::Arch => Some(&*PLATFORM_ARCH_MAP),
            Self::Os => Some(&*PLATFORM_OS_MAP),
            Self::OsArch => Some(&*PLATFORM_OS_ARCH_MAP),
            Self::InApex => Some(&*IN_APEX_MAP),
            Self::ErrorProneDisabled => Some(&*ERROR_PRONE_MAP),
            Self::SanitizersEnabled => Some(&*SANITIZERS_ENABLED_MAP),
            Self::NoConfig | Self::ProductVariables | Self::OsAndInApex => None,
        }
    }

    /// Checks that `config` is a valid key for this configuration type.
    pub fn validate_config(self, config: &str) -> Result<(), AttributeError> {
        match self {
            Self::NoConfig => {
                if !config.is_empty() {
                    return Err(AttributeError::ConfigOnNoConfigAxis(config.to_string()));
                }
            }
            // Product variables and the os_in_apex axis accept arbitrary keys.
            Self::ProductVariables | Self::OsAndInApex => {}
            _ => {
                let known = self.known_configs().is_some_and(|m| m.contains_key(config));
                if !known {
                    return Err(AttributeError::UnknownConfig {
                        configuration_type: self,
                        config: config.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// An independent axis of configuration. Configs within one axis never
/// overlap.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigurationAxis {
    configuration_type: ConfigurationType,
    // Distinguishes independent axes of the same type, e.g. one per product
    // variable.
    sub_type: String,
    arch_variant: bool,
}

impl ConfigurationAxis {
    pub const NO_CONFIG: Self = Self::fixed(ConfigurationType::NoConfig);
    pub const ARCH: Self = Self::fixed(ConfigurationType::Arch);
    pub const OS: Self = Self::fixed(ConfigurationType::Os);
    pub const OS_ARCH: Self = Self::fixed(ConfigurationType::OsArch);
    pub const OS_AND_IN_APEX: Self = Self::fixed(ConfigurationType::OsAndInApex);
    pub const IN_APEX: Self = Self::fixed(ConfigurationType::InApex);
    pub const ERROR_PRONE: Self = Self::fixed(ConfigurationType::ErrorProneDisabled);
    pub const SANITIZERS_ENABLED: Self = Self::fixed(ConfigurationType::SanitizersEnabled);

    const fn fixed(configuration_type: ConfigurationType) -> Self {
        Self {
            configuration_type,
            sub_type: String::new(),
            arch_variant: false,
        }
    }

    /// Returns the axis of a single product variable.
    pub fn product_variable(arch_variant: bool, variable: &str) -> Self {
        Self {
            configuration_type: ConfigurationType::ProductVariables,
            sub_type: variable.to_string(),
            arch_variant,
        }
    }

    pub fn configuration_type(&self) -> ConfigurationType {
        self.configuration_type
    }

    pub fn sub_type(&self) -> &str {
        &self.sub_type
    }

    pub fn arch_variant(&self) -> bool {
        self.arch_variant
    }

    pub fn validate_config(&self, config: &str) -> Result<(), AttributeError> {
        self.configuration_type.validate_config(config)
    }

    /// Returns the Bazel select key for `config` on this axis.
    pub fn select_key(&self, config: &str) -> Result<String, AttributeError> {
        self.validate_config(config)?;
        let key = match self.configuration_type {
            ConfigurationType::NoConfig => return Err(AttributeError::NoSelectKey),
            ConfigurationType::ProductVariables => {
                if config == CONDITIONS_DEFAULT_CONFIG_KEY {
                    CONDITIONS_DEFAULT_SELECT_KEY.to_string()
                } else {
                    format!("{PRODUCT_VARIABLE_BAZEL_PACKAGE}:{config}")
                }
            }
            ConfigurationType::OsAndInApex => OS_AND_IN_APEX_MAP
                .get(config)
                .cloned()
                .unwrap_or_else(|| config.to_string()),
            other => other
                .known_configs()
                .and_then(|m| m.get(config))
                .cloned()
                .ok_or_else(|| AttributeError::UnknownConfig {
                    configuration_type: other,
                    config: config.to_string(),
                })?,
        };
        Ok(key)
    }
}

const PRODUCT_VARIABLES_ARCH_VARIANT_PREFIX: &str = "product_variables_arch_variant:";
const PRODUCT_VARIABLES_PREFIX: &str = "product_variables:";

impl fmt::Display for ConfigurationAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.configuration_type {
            ConfigurationType::ProductVariables if self.arch_variant => {
                write!(f, "{}{}", PRODUCT_VARIABLES_ARCH_VARIANT_PREFIX, self.sub_type)
            }
            ConfigurationType::ProductVariables => {
                write!(f, "{}{}", PRODUCT_VARIABLES_PREFIX, self.sub_type)
            }
            other => write!(f, "{other}"),
        }
    }
}

impl FromStr for ConfigurationAxis {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix(PRODUCT_VARIABLES_ARCH_VARIANT_PREFIX) {
            return Ok(Self::product_variable(true, name));
        }
        if let Some(name) = s.strip_prefix(PRODUCT_VARIABLES_PREFIX) {
            return Ok(Self::product_variable(false, name));
        }
        match ConfigurationType::from_str(s) {
            Ok(ConfigurationType::ProductVariables) | Err(_) => {
                Err(AttributeError::UnknownAxis(s.to_string()))
            }
            Ok(t) => Ok(Self::fixed(t)),
        }
    }
}

impl TryFrom<String> for ConfigurationAxis {
    type Error = AttributeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConfigurationAxis> for String {
    fn from(value: ConfigurationAxis) -> Self {
        value.to_string()
    }
}
