//! Step definitions.
//!
//! A [`Step`] names one control-plane call, its parameters (literal, a
//! reference to an earlier output, or a `${key}` template over outputs), the
//! outputs it contributes to the registry and what happens when it fails.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::cloud::{FieldSpec, Operation, ResourceKind};
use crate::config::interpolation::{extract_variables, resolve_string};
use crate::error::Result;
use crate::outputs::OutputRegistry;

/// What a failed step does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the pipeline.
    #[default]
    Hard,
    /// Log a warning and continue.
    Soft,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Hard => write!(f, "hard"),
            FailurePolicy::Soft => write!(f, "soft"),
        }
    }
}

/// A step parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// Passed through unchanged.
    Literal(String),
    /// The value of one registry key.
    Ref(String),
    /// A string with `${key}` references.
    Template(String),
}

impl Param {
    /// Registry keys this parameter reads.
    pub fn references(&self) -> BTreeSet<String> {
        match self {
            Param::Literal(_) => BTreeSet::new(),
            Param::Ref(key) => BTreeSet::from([key.clone()]),
            Param::Template(template) => extract_variables(template),
        }
    }

    /// Resolve against the registry on behalf of `step`.
    pub fn resolve(&self, step: &str, registry: &OutputRegistry) -> Result<String> {
        match self {
            Param::Literal(value) => Ok(value.clone()),
            Param::Ref(key) => registry.require(step, key).map(str::to_string),
            Param::Template(template) => resolve_string(template, step, registry),
        }
    }
}

/// Where an output value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSource {
    /// JSON pointer into the control-plane payload.
    Field(String),
    /// Template over registry keys, e.g. a full image reference.
    Derived(String),
}

/// An output a step writes to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDecl {
    pub name: String,
    pub source: OutputSource,
}

/// One provisioning step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique name; also the namespace of its outputs.
    pub name: String,
    /// Human-readable title for progress output.
    pub title: String,
    pub operation: Operation,
    pub kind: ResourceKind,
    pub params: BTreeMap<String, Param>,
    pub outputs: Vec<OutputDecl>,
    pub policy: FailurePolicy,
    /// Pause for principal propagation and retry the call while it settles.
    pub awaits_propagation: bool,
}

impl Step {
    /// Start building a step that creates a resource.
    pub fn create(name: impl Into<String>, kind: ResourceKind) -> StepBuilder {
        StepBuilder::new(name.into(), Operation::Create, kind)
    }

    /// Start building a step that reads an existing resource.
    pub fn show(name: impl Into<String>, kind: ResourceKind) -> StepBuilder {
        StepBuilder::new(name.into(), Operation::Show, kind)
    }

    /// Every registry key this step reads.
    pub fn input_keys(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self.params.values().flat_map(Param::references).collect();
        for output in &self.outputs {
            if let OutputSource::Derived(template) = &output.source {
                keys.extend(extract_variables(template));
            }
        }
        keys
    }

    /// Every registry key this step writes, in declaration order.
    pub fn output_keys(&self) -> Vec<String> {
        self.outputs
            .iter()
            .map(|o| OutputRegistry::key(&self.name, &o.name))
            .collect()
    }

    /// Outputs read from the control-plane payload.
    pub fn field_specs(&self) -> Vec<FieldSpec> {
        self.outputs
            .iter()
            .filter_map(|o| match &o.source {
                OutputSource::Field(pointer) => Some(FieldSpec::new(o.name.clone(), pointer.clone())),
                OutputSource::Derived(_) => None,
            })
            .collect()
    }
}

/// Builder for [`Step`].
#[derive(Debug, Clone)]
pub struct StepBuilder {
    step: Step,
}

impl StepBuilder {
    fn new(name: String, operation: Operation, kind: ResourceKind) -> Self {
        Self {
            step: Step {
                title: name.clone(),
                name,
                operation,
                kind,
                params: BTreeMap::new(),
                outputs: Vec::new(),
                policy: FailurePolicy::Hard,
                awaits_propagation: false,
            },
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.step.title = title.into();
        self
    }

    pub fn literal(mut self, param: impl Into<String>, value: impl ToString) -> Self {
        self.step
            .params
            .insert(param.into(), Param::Literal(value.to_string()));
        self
    }

    /// Parameter taken from an earlier step's output.
    pub fn reference(mut self, param: impl Into<String>, key: impl Into<String>) -> Self {
        self.step.params.insert(param.into(), Param::Ref(key.into()));
        self
    }

    pub fn template(mut self, param: impl Into<String>, template: impl Into<String>) -> Self {
        self.step
            .params
            .insert(param.into(), Param::Template(template.into()));
        self
    }

    pub fn param(mut self, param: impl Into<String>, value: Param) -> Self {
        self.step.params.insert(param.into(), value);
        self
    }

    /// Output read from the payload at a JSON pointer.
    pub fn output(mut self, name: impl Into<String>, pointer: impl Into<String>) -> Self {
        self.step.outputs.push(OutputDecl {
            name: name.into(),
            source: OutputSource::Field(pointer.into()),
        });
        self
    }

    /// Output computed from a template over registry keys.
    pub fn derived(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.step.outputs.push(OutputDecl {
            name: name.into(),
            source: OutputSource::Derived(template.into()),
        });
        self
    }

    pub fn soft(mut self) -> Self {
        self.step.policy = FailurePolicy::Soft;
        self
    }

    pub fn awaits_propagation(mut self) -> Self {
        self.step.awaits_propagation = true;
        self
    }

    pub fn build(self) -> Step {
        self.step
    }
}
