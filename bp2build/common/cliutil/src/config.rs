// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::LoggingConfig;
use anyhow::Result;

/// Builds a [`Config`] for [`crate::cli_main`].
#[derive(Default)]
pub struct ConfigBuilder {
    logging: Option<LoggingConfig>,
    log_command_line: bool,
}

impl ConfigBuilder {
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            logging: None,
            log_command_line: true,
        }
    }

    /// Overrides the logging config. If this isn't called, it defaults to
    /// `LoggingConfig::from_env()`.
    #[inline(always)]
    pub fn logging(mut self, cfg: LoggingConfig) -> Self {
        self.logging = Some(cfg);
        self
    }

    /// `enable` controls whether to log the command-line of the current process.
    #[inline(always)]
    pub fn log_command_line(mut self, enable: bool) -> Self {
        self.log_command_line = enable;
        self
    }

    #[inline(always)]
    pub fn build(self) -> Result<Config> {
        let logging = match self.logging {
            Some(logging) => logging,
            None => LoggingConfig::from_env()?,
        };
        Ok(Config {
            logging,
            log_command_line: self.log_command_line,
        })
    }
}

/// The process configuration after defaults have been applied.
pub struct Config {
    pub(crate) logging: LoggingConfig,
    pub(crate) log_command_line: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config() {
        let config = ConfigBuilder::new()
            .logging(LoggingConfig {
                trace_file: None,
                log_file: None,
                log_format: Default::default(),
                console_logger: None,
            })
            .log_command_line(false)
            .build()
            .unwrap();
        assert!(!config.log_command_line);
        assert!(config.logging.trace_file.is_none());
    }
}
