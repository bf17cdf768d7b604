//! Connector settings as handed over by the hosting framework.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use doclink_core::{
    error::ConnectorResult,
    model::ModelDefinitions,
    translate::{LessThanMapping, TranslateOptions},
};
use doclink_memory::MemoryEngineBuilder;

fn default_filename() -> String {
    "defaultDb.db".to_string()
}

fn default_autosave_interval() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

/// Settings of a data source backed by the embedded engine.
///
/// Deserializes from the framework's JSON data-source configuration; every field is
/// optional.
///
/// ```ignore
/// let settings = ConnectorSettings::from_value(serde_json::json!({
///     "name": "db",
///     "file": "app.db",
///     "autosaveInterval": 5000,
///     "models": { "Product": { "id": "code" } },
/// }))?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorSettings {
    /// Data source name, used only in logs.
    #[serde(default)]
    pub name: Option<String>,
    /// Snapshot file of the engine.
    #[serde(default = "default_filename", alias = "file")]
    pub filename: String,
    /// Load the snapshot file on connect if it exists.
    #[serde(default = "default_true")]
    pub autoload: bool,
    /// Periodically write pending mutations to the snapshot file.
    #[serde(default = "default_true")]
    pub autosave: bool,
    /// Autosave period, in milliseconds.
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval: u64,
    /// `false` keeps everything in memory and never touches the disk.
    #[serde(default = "default_true")]
    pub persist: bool,
    /// How the framework's `lt` is mapped onto the engine.
    #[serde(default)]
    pub less_than: LessThanMapping,
    /// Per-model definitions.
    #[serde(default)]
    pub models: ModelDefinitions,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            name: None,
            filename: default_filename(),
            autoload: true,
            autosave: true,
            autosave_interval: default_autosave_interval(),
            persist: true,
            less_than: LessThanMapping::default(),
            models: ModelDefinitions::default(),
        }
    }
}

impl ConnectorSettings {
    /// Parses settings from a JSON value. `null` yields the defaults.
    pub fn from_value(value: serde_json::Value) -> ConnectorResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }

        Ok(serde_json::from_value(value)?)
    }

    /// Filter translation options derived from these settings.
    pub fn translate_options(&self) -> TranslateOptions {
        TranslateOptions { less_than: self.less_than }
    }

    /// An engine builder configured from these settings.
    pub fn engine_builder(&self) -> MemoryEngineBuilder {
        let builder = MemoryEngineBuilder::default();

        if !self.persist {
            return builder;
        }

        let builder = builder
            .filename(&self.filename)
            .autoload(self.autoload);

        if self.autosave && self.autosave_interval > 0 {
            builder.autosave_interval(Duration::from_millis(self.autosave_interval))
        } else {
            builder
        }
    }
}
