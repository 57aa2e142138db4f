//! The contract between a generated module and the framework that runs it
//!
//! The framework drives an analysis module through a fixed set of lifecycle
//! phases. [`LifecyclePhase`] names them together with the entry point a
//! generated module source has to expose, and [`EventAnalyzer`] is the same
//! contract for modules written directly in Rust. Modules are made available
//! to a host through an explicit [`ModuleRegistry`].

pub mod registry;

pub use registry::{ModuleFactory, ModuleRegistry, RegistryError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle phases in the order a host may invoke them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Construct,
    BeginJob,
    BeginRun,
    BeginLuminosityBlock,
    Analyze,
    EndLuminosityBlock,
    EndRun,
    EndJob,
    FillDescriptions,
}

impl LifecyclePhase {
    pub const ALL: [LifecyclePhase; 9] = [
        LifecyclePhase::Construct,
        LifecyclePhase::BeginJob,
        LifecyclePhase::BeginRun,
        LifecyclePhase::BeginLuminosityBlock,
        LifecyclePhase::Analyze,
        LifecyclePhase::EndLuminosityBlock,
        LifecyclePhase::EndRun,
        LifecyclePhase::EndJob,
        LifecyclePhase::FillDescriptions,
    ];

    /// Method name as it appears in a module source.
    pub fn method_name(&self) -> &'static str {
        match self {
            LifecyclePhase::Construct => "",
            LifecyclePhase::BeginJob => "beginJob",
            LifecyclePhase::BeginRun => "beginRun",
            LifecyclePhase::BeginLuminosityBlock => "beginLuminosityBlock",
            LifecyclePhase::Analyze => "analyze",
            LifecyclePhase::EndLuminosityBlock => "endLuminosityBlock",
            LifecyclePhase::EndRun => "endRun",
            LifecyclePhase::EndJob => "endJob",
            LifecyclePhase::FillDescriptions => "fillDescriptions",
        }
    }

    /// The out-of-line definition a module called `module_name` must contain,
    /// e.g. `Analyzer::analyze(`.
    pub fn entry_point(&self, module_name: &str) -> String {
        match self {
            LifecyclePhase::Construct => format!("{module_name}::{module_name}("),
            other => format!("{module_name}::{}(", other.method_name()),
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Construct => f.write_str("construct"),
            other => f.write_str(other.method_name()),
        }
    }
}

/// A typed configuration value handed to a module at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<ParameterValue>),
}

/// Named construction parameters. Never validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParameterValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

/// What a module declares about its accepted parameters. Parameters are
/// never validated, so the only description is "anything goes".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDescription {
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInfo {
    pub run: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuminosityBlock {
    pub run: u32,
    pub block: u32,
}

/// One processed element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run: u32,
    pub luminosity_block: u32,
    pub number: u64,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// A module the host drives through the lifecycle phases.
///
/// Only [`EventAnalyzer::analyze`] is required.
pub trait EventAnalyzer: Send {
    fn begin_job(&mut self) {}

    fn begin_run(&mut self, _run: &RunInfo) {}

    fn begin_luminosity_block(&mut self, _block: &LuminosityBlock) {}

    fn analyze(&mut self, event: &Event);

    fn end_luminosity_block(&mut self, _block: &LuminosityBlock) {}

    fn end_run(&mut self, _run: &RunInfo) {}

    fn end_job(&mut self) {}

    fn fill_descriptions(&self) -> ParameterDescription {
        ParameterDescription::Unknown
    }
}
