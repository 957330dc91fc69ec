// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Run-scoped generation context.
//!
//! A [`Context`] is built once per generation run and handed to every
//! processor's `start_run`. It is immutable for the duration of the run;
//! renderers copy what they need into their own run state.

use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};

/// Immutable configuration for a single generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    input_root: PathBuf,
    output_root: PathBuf,
    timestamp: String,
    deploy_dir: Option<PathBuf>,
    variables: Map<String, JsonValue>,
}

impl Context {
    /// Creates a context with no deploy directory and no variables.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>, S: Into<String>>(
        input_root: P,
        output_root: Q,
        timestamp: S,
    ) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            timestamp: timestamp.into(),
            deploy_dir: None,
            variables: Map::new(),
        }
    }

    /// Sets the deploy directory exported to renderers.
    pub fn with_deploy_dir(mut self, deploy_dir: Option<PathBuf>) -> Self {
        self.deploy_dir = deploy_dir;
        self
    }

    /// Adds renderer variables. Reserved keys are not overridable.
    pub fn with_variables(mut self, variables: Map<String, JsonValue>) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Root of the source tree.
    pub fn input_root(&self) -> &Path {
        &self.input_root
    }

    /// Root of the generated tree.
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Generation timestamp (`YYYYMMDDHHMMSS`).
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Publish directory, when the run is tied to one.
    pub fn deploy_dir(&self) -> Option<&Path> {
        self.deploy_dir.as_deref()
    }

    /// User variables, without the reserved run keys.
    pub fn variables(&self) -> &Map<String, JsonValue> {
        &self.variables
    }

    /// Flattens the context into the JSON object renderers see.
    ///
    /// User variables come first so that `input_root`, `output_root`,
    /// `timestamp` and `deploy_dir` always reflect the run.
    pub fn to_json(&self) -> JsonValue {
        let mut map = self.variables.clone();
        _ = map.insert(
            "input_root".to_string(),
            JsonValue::String(self.input_root.display().to_string()),
        );
        _ = map.insert(
            "output_root".to_string(),
            JsonValue::String(self.output_root.display().to_string()),
        );
        _ = map.insert(
            "timestamp".to_string(),
            JsonValue::String(self.timestamp.clone()),
        );
        _ = map.insert(
            "deploy_dir".to_string(),
            self.deploy_dir
                .as_ref()
                .map(|d| JsonValue::String(d.display().to_string()))
                .unwrap_or(JsonValue::Null),
        );
        JsonValue::Object(map)
    }
}
