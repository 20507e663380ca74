// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::{collections::BTreeSet, fmt};

use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

use super::RequestType;

/// Whether an OS runs on the device or on the build host.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OsClass {
    #[default]
    Device,
    Host,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OsType {
    pub name: String,
    pub class: OsClass,
}

impl OsType {
    pub fn new(name: impl Into<String>, class: OsClass) -> Self {
        Self {
            name: name.into(),
            class,
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The APEX-related part of a target configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApexConfigKey {
    pub within_apex: bool,
    pub apex_sdk_version: String,
    pub api_domain: String,
}

fn within_apex_to_str(within_apex: bool) -> &'static str {
    if within_apex {
        "within_apex"
    } else {
        ""
    }
}

impl fmt::Display for ApexConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            within_apex_to_str(self.within_apex),
            self.apex_sdk_version,
            self.api_domain
        )
    }
}

/// The configuration a target is requested in.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigKey {
    pub arch: String,
    pub os_type: OsType,
    pub apex_key: ApexConfigKey,
}

impl ConfigKey {
    pub fn new(arch: impl Into<String>, os_type: OsType) -> Self {
        Self {
            arch: arch.into(),
            os_type,
            apex_key: ApexConfigKey::default(),
        }
    }

    pub fn with_apex_key(mut self, apex_key: ApexConfigKey) -> Self {
        self.apex_key = apex_key;
        self
    }

    /// Returns the configuration part of a cquery id, in the form the
    /// formatter program computes it for a configured target.
    pub fn config_string(&self) -> String {
        let arch = if self.arch.is_empty() || self.arch == "common" {
            match self.os_type.class {
                // The generic Android configuration.
                OsClass::Device => "target",
                // The host platform is always x86_64.
                OsClass::Host => "x86_64",
            }
        } else {
            self.arch.as_str()
        };
        let os = match self.os_type.name.as_str() {
            "" | "common_os" | "linux_glibc" | "linux_musl" => "linux",
            name => name,
        };

        let mut parts = vec![arch, os];
        if self.apex_key.within_apex {
            parts.push(within_apex_to_str(true));
        }
        if !self.apex_key.apex_sdk_version.is_empty() {
            parts.push(&self.apex_key.apex_sdk_version);
        }
        if !self.apex_key.api_domain.is_empty() {
            parts.push(&self.apex_key.api_domain);
        }
        parts.join("|")
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.arch, self.os_type, self.apex_key)
    }
}

/// Identifies a single cquery request.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CqueryKey {
    label: String,
    request_type: RequestType,
    config_key: ConfigKey,
}

impl CqueryKey {
    /// Creates a key. Labels of the main repository are normalized to name
    /// it explicitly, i.e. `//foo:bar` becomes `@//foo:bar`.
    pub fn new(label: &str, request_type: RequestType, config_key: ConfigKey) -> Self {
        let label = if label.starts_with("//") {
            format!("@{label}")
        } else {
            label.to_string()
        };
        Self {
            label,
            request_type,
            config_key,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn config_key(&self) -> &ConfigKey {
        &self.config_key
    }

    /// Returns the id the formatter program prints in front of the result of
    /// this request.
    pub fn cquery_id(&self) -> String {
        format!("{}|{}", self.label, self.config_key.config_string())
    }
}

impl fmt::Display for CqueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cquery({},{},{})",
            self.label, self.request_type, self.config_key
        )
    }
}

/// A deduplicated, ordered queue of cquery requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CqueryRequests {
    keys: BTreeSet<CqueryKey>,
}

impl CqueryRequests {
    pub fn new() -> Self {
        Default::default()
    }

    /// Queues a request. Returns false if it was already queued.
    pub fn queue(&mut self, label: &str, request_type: RequestType, config_key: ConfigKey) -> bool {
        self.keys
            .insert(CqueryKey::new(label, request_type, config_key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CqueryKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<CqueryKey> for CqueryRequests {
    fn from_iter<I: IntoIterator<Item = CqueryKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn android() -> OsType {
        OsType::new("android", OsClass::Device)
    }

    fn linux() -> OsType {
        OsType::new("linux_glibc", OsClass::Host)
    }

    #[test]
    fn test_label_normalization() {
        let key = CqueryKey::new("//foo:bar", RequestType::GetOutputFiles, ConfigKey::default());
        assert_eq!(key.label(), "@//foo:bar");
        let key = CqueryKey::new("@repo//foo:bar", RequestType::GetOutputFiles, ConfigKey::default());
        assert_eq!(key.label(), "@repo//foo:bar");
    }

    #[test]
    fn test_cquery_id() {
        let key = CqueryKey::new(
            "//foo:bar",
            RequestType::GetCcInfo,
            ConfigKey::new("arm64", android()),
        );
        assert_eq!(key.cquery_id(), "@//foo:bar|arm64|android");

        let key = CqueryKey::new(
            "//foo:bar",
            RequestType::GetCcInfo,
            ConfigKey::new("common", android()),
        );
        assert_eq!(key.cquery_id(), "@//foo:bar|target|android");

        let key = CqueryKey::new("//foo:bar", RequestType::GetCcInfo, ConfigKey::new("", linux()));
        assert_eq!(key.cquery_id(), "@//foo:bar|x86_64|linux");

        let key = CqueryKey::new(
            "//foo:bar",
            RequestType::GetCcInfo,
            ConfigKey::new("x86", OsType::new("linux_musl", OsClass::Host)),
        );
        assert_eq!(key.cquery_id(), "@//foo:bar|x86|linux");
    }

    #[test]
    fn test_cquery_id_with_apex_key() {
        let config = ConfigKey::new("arm", android()).with_apex_key(ApexConfigKey {
            within_apex: true,
            apex_sdk_version: "29".to_string(),
            api_domain: "com.android.foo".to_string(),
        });
        let key = CqueryKey::new("//foo:bar", RequestType::GetCcInfo, config);
        assert_eq!(
            key.cquery_id(),
            "@//foo:bar|arm|android|within_apex|29|com.android.foo"
        );

        let config = ConfigKey::new("arm", android()).with_apex_key(ApexConfigKey {
            within_apex: false,
            apex_sdk_version: String::new(),
            api_domain: "system".to_string(),
        });
        let key = CqueryKey::new("//foo:bar", RequestType::GetCcInfo, config);
        assert_eq!(key.cquery_id(), "@//foo:bar|arm|android|system");
    }

    #[test]
    fn test_display() {
        let config = ConfigKey::new("arm", android()).with_apex_key(ApexConfigKey {
            within_apex: true,
            apex_sdk_version: "30".to_string(),
            api_domain: String::new(),
        });
        assert_eq!(config.to_string(), "arm::android::within_apex_30_");

        let key = CqueryKey::new("//a:b", RequestType::GetApexInfo, ConfigKey::new("x86", linux()));
        assert_eq!(key.to_string(), "cquery(@//a:b,getApexInfo,x86::linux_glibc::__)");
    }

    #[test]
    fn test_requests_are_deduplicated_and_sorted() {
        let mut requests = CqueryRequests::new();
        let config = ConfigKey::new("arm", android());
        assert!(requests.queue("//b:b", RequestType::GetOutputFiles, config.clone()));
        assert!(requests.queue("//a:a", RequestType::GetCcInfo, config.clone()));
        assert!(!requests.queue("@//b:b", RequestType::GetOutputFiles, config));
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests.iter().map(|k| k.label()).collect::<Vec<_>>(),
            vec!["@//a:a", "@//b:b"]
        );
    }
}
