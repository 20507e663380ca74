// Copyright 2023 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use anyhow::{bail, Context, Result};
use itertools::Itertools;
use std::{
    ffi::OsString,
    fs::File,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing_chrome::{ChromeLayerBuilder, FlushGuard};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

/// Environment variables selecting where the Chrome trace goes: a directory
/// to create a uniquely named file in, or a file path. Setting both is an
/// error.
pub const TRACE_DIR_ENV: &str = "BP2BUILD_TRACE_DIR";
pub const TRACE_FILE_ENV: &str = "BP2BUILD_TRACE_FILE";

/// Same as above, for the log file.
pub const LOG_DIR_ENV: &str = "BP2BUILD_LOG_DIR";
pub const LOG_FILE_ENV: &str = "BP2BUILD_LOG_FILE";

/// Format of the log file: `text` (default) or `json`.
pub const LOG_FORMAT_ENV: &str = "BP2BUILD_LOG_FORMAT";

/// If "0", don't log to the console.
pub const CONSOLE_LOG_ENV: &str = "BP2BUILD_LOG_CONSOLE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps the trace file flushed and the main span entered until dropped.
pub struct LogGuard {
    _span_guard: tracing::span::EnteredSpan,
    _flush_guard: Option<FlushGuard>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event, for machine consumption.
    Json,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("") | Some("text") => Ok(Self::Text),
            Some("json") => Ok(Self::Json),
            Some(other) => bail!("Unknown {LOG_FORMAT_ENV} value: {other:?}"),
        }
    }
}

/// The configuration for the logger.
pub struct LoggingConfig {
    /// Where to write the Chrome trace JSON.
    pub trace_file: Option<PathBuf>,
    /// Where to write logs, and which of them.
    pub log_file: Option<(PathBuf, EnvFilter)>,
    pub log_format: LogFormat,
    /// Which logs to write to stderr. None disables console logging.
    pub console_logger: Option<EnvFilter>,
}

fn default_filter() -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?)
}

/// Picks the output file from a pair of file/directory settings.
fn output_path(
    file: Option<OsString>,
    dir: Option<OsString>,
    file_name: impl FnOnce() -> String,
) -> Option<Result<PathBuf>> {
    match (file, dir) {
        (Some(_), Some(_)) => Some(Err(anyhow::anyhow!(
            "Only one of a file and a directory can be set"
        ))),
        (Some(file), None) => Some(Ok(PathBuf::from(file))),
        (None, Some(dir)) => Some(Ok(Path::new(&dir).join(file_name()))),
        (None, None) => None,
    }
}

fn output_path_from_env(file_env: &str, dir_env: &str, ext: &str) -> Result<Option<PathBuf>> {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    output_path(std::env::var_os(file_env), std::env::var_os(dir_env), || {
        format!("{}.{timestamp}.{ext}", crate::get_current_process_name())
    })
    .transpose()
    .with_context(|| format!("Invalid {file_env}/{dir_env}"))
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        let trace_file = output_path_from_env(TRACE_FILE_ENV, TRACE_DIR_ENV, "json")?;
        let log_file = match output_path_from_env(LOG_FILE_ENV, LOG_DIR_ENV, "log")? {
            Some(path) => Some((path, default_filter()?)),
            None => None,
        };
        let log_format = LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())?;
        let console_logger = match std::env::var(CONSOLE_LOG_ENV).ok().as_deref() {
            Some("0") => None,
            _ => Some(default_filter()?),
        };

        Ok(Self {
            trace_file,
            log_file,
            log_format,
            console_logger,
        })
    }

    fn file_layer(log_file: &Path, filter: EnvFilter, format: LogFormat) -> Result<BoxedLayer> {
        let f = File::create(log_file)
            .with_context(|| format!("Failed to open log file {log_file:?}"))?;
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(f);
        Ok(match format {
            LogFormat::Text => layer.with_filter(filter).boxed(),
            LogFormat::Json => layer.json().with_filter(filter).boxed(),
        })
    }

    /// Installs the global tracing subscriber and enters a span named "main"
    /// recording the command line.
    pub fn setup(self) -> Result<LogGuard> {
        let mut layers: Vec<BoxedLayer> = Vec::new();

        let mut flush_guard = None;
        if let Some(trace_file) = &self.trace_file {
            let f = File::create(trace_file)
                .with_context(|| format!("Failed to set up tracing to {trace_file:?}"))?;
            let (chrome_layer, guard) = ChromeLayerBuilder::new()
                .writer(f)
                .include_args(true)
                .build();
            layers.push(chrome_layer.boxed());
            flush_guard = Some(guard);
        }

        if let Some(filter) = self.console_logger {
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(filter)
                    .boxed(),
            );
        }

        if let Some((log_file, filter)) = self.log_file {
            layers.push(Self::file_layer(&log_file, filter, self.log_format)?);
        }

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .context("Failed to start tracing: a global subscriber is already installed")?;

        let args = std::env::args()
            .map(|s| shell_escape::escape(s.into()))
            .join(" ");
        let span_guard = tracing::trace_span!("main", args = args).entered();

        Ok(LogGuard {
            _span_guard: span_guard,
            _flush_guard: flush_guard,
        })
    }
}
