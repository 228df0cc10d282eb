// SPDX-FileCopyrightText: 2026 Contributors to the MediaGraph project.
// SPDX-License-Identifier: Apache-2.0

//! Typed graph configuration.
//!
//! [`GraphConfig`] is a serde-serializable description of a graph that
//! renders to the engine's text grammar. Building a config through this
//! module validates every stream name host-side before the text ever
//! reaches the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::name::validate_name;
use crate::{Result, name};

/// One node of the processing graph.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// Registered calculator name (e.g. `"PassThroughCalculator"`).
    pub calculator: String,
    /// Stream spec the node reads (`(TAG:)?(index:)?name`).
    pub input_stream: String,
    /// Stream spec the node writes.
    pub output_stream: String,
}

/// A complete graph description.
///
/// # Examples
///
/// ```
/// use mediagraph::GraphConfig;
///
/// let config = GraphConfig::new()
///     .input_stream("input")
///     .output_stream("output")
///     .node("PassThroughCalculator", "input", "output");
/// let text = config.to_text();
/// assert!(text.contains("calculator: \"PassThroughCalculator\""));
/// ```
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct GraphConfig {
    /// Named streams the host pushes packets into.
    pub input_streams: Vec<String>,
    /// Named streams the host retrieves packets from.
    pub output_streams: Vec<String>,
    /// Processing nodes in topological order.
    pub nodes: Vec<NodeConfig>,
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a graph input stream.
    pub fn input_stream(mut self, name: impl Into<String>) -> Self {
        self.input_streams.push(name.into());
        self
    }

    /// Adds a graph output stream.
    pub fn output_stream(mut self, name: impl Into<String>) -> Self {
        self.output_streams.push(name.into());
        self
    }

    /// Adds a processing node.
    pub fn node(
        mut self,
        calculator: impl Into<String>,
        input_stream: impl Into<String>,
        output_stream: impl Into<String>,
    ) -> Self {
        self.nodes.push(NodeConfig {
            calculator: calculator.into(),
            input_stream: input_stream.into(),
            output_stream: output_stream.into(),
        });
        self
    }

    /// Validates every stream spec against the name grammar.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidName`] for the first malformed spec.
    pub fn validate(&self) -> Result<()> {
        for stream in self.input_streams.iter().chain(&self.output_streams) {
            validate_name(stream)?;
        }
        for node in &self.nodes {
            name::parse_tag_index_name(&node.input_stream)?;
            name::parse_tag_index_name(&node.output_stream)?;
        }
        Ok(())
    }

    /// Renders the config in the engine's text grammar.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for stream in &self.input_streams {
            text.push_str(&format!("input_stream: \"{stream}\"\n"));
        }
        for stream in &self.output_streams {
            text.push_str(&format!("output_stream: \"{stream}\"\n"));
        }
        for node in &self.nodes {
            text.push_str(&format!(
                "node {{\n  calculator: \"{}\"\n  input_stream: \"{}\"\n  output_stream: \"{}\"\n}}\n",
                node.calculator, node.input_stream, node.output_stream
            ));
        }
        text
    }
}

impl fmt::Display for GraphConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn pass_through() -> GraphConfig {
        GraphConfig::new()
            .input_stream("input")
            .output_stream("output")
            .node("PassThroughCalculator", "input", "output")
    }

    #[test]
    fn renders_engine_grammar() {
        let text = pass_through().to_text();
        assert_eq!(
            text,
            "input_stream: \"input\"\n\
             output_stream: \"output\"\n\
             node {\n  calculator: \"PassThroughCalculator\"\n  \
             input_stream: \"input\"\n  output_stream: \"output\"\n}\n"
        );
    }

    #[test]
    fn validate_rejects_bad_names() {
        let config = pass_through().input_stream("2bad");
        assert!(matches!(config.validate(), Err(Error::InvalidName(_))));
        assert!(pass_through().validate().is_ok());
    }
}
