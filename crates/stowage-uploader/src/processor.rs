//! Processor registry
//!
//! Processors are named steps defined on an uploader type. `process` declares
//! which steps run, with which arguments, in which order; every instance of
//! the type replays the same sequence after each cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{UploaderError, UploaderResult};
use crate::uploader::Uploader;

/// Positional argument bound to a step
pub type ProcessorArg = serde_json::Value;

/// One declared step: a processor name and its bound arguments
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessStep {
    pub name: String,
    pub args: Vec<ProcessorArg>,
}

impl ProcessStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Vec<ProcessorArg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

impl From<&str> for ProcessStep {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ProcessStep {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<(&str, Vec<ProcessorArg>)> for ProcessStep {
    fn from((name, args): (&str, Vec<ProcessorArg>)) -> Self {
        Self::with_args(name, args)
    }
}

impl From<(String, Vec<ProcessorArg>)> for ProcessStep {
    fn from((name, args): (String, Vec<ProcessorArg>)) -> Self {
        Self::with_args(name, args)
    }
}

/// A transformation run on the uploader after its file is cached.
///
/// Steps share the uploader: a step that replaces or rewrites the file is
/// seen by every later step.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn call(&self, uploader: &mut Uploader, args: &[ProcessorArg]) -> anyhow::Result<()>;
}

/// Processor adapter for synchronous closures
pub struct FnProcessor<F>(F);

pub fn processor_fn<F>(f: F) -> FnProcessor<F>
where
    F: Fn(&mut Uploader, &[ProcessorArg]) -> anyhow::Result<()> + Send + Sync,
{
    FnProcessor(f)
}

#[async_trait]
impl<F> Processor for FnProcessor<F>
where
    F: Fn(&mut Uploader, &[ProcessorArg]) -> anyhow::Result<()> + Send + Sync,
{
    async fn call(&self, uploader: &mut Uploader, args: &[ProcessorArg]) -> anyhow::Result<()> {
        (self.0)(uploader, args)
    }
}

/// Named processors plus the ordered steps that invoke them
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    definitions: HashMap<String, Arc<dyn Processor>>,
    steps: Vec<ProcessStep>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) the processor a step name refers to
    pub fn define(&mut self, name: impl Into<String>, processor: impl Processor + 'static) {
        self.definitions.insert(name.into(), Arc::new(processor));
    }

    /// Append steps, preserving their order
    pub fn process<I, S>(&mut self, steps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ProcessStep>,
    {
        self.steps.extend(steps.into_iter().map(Into::into));
    }

    pub fn steps(&self) -> &[ProcessStep] {
        &self.steps
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Processor>> {
        self.definitions.get(name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every declared step must name a defined processor
    pub fn validate(&self) -> UploaderResult<()> {
        match self
            .steps
            .iter()
            .find(|step| !self.definitions.contains_key(&step.name))
        {
            Some(step) => Err(UploaderError::UnknownProcessor(step.name.clone())),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut defined: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        defined.sort_unstable();
        f.debug_struct("ProcessorRegistry")
            .field("defined", &defined)
            .field("steps", &self.steps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl Processor for Noop {
        async fn call(&self, _: &mut Uploader, _: &[ProcessorArg]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_step_conversions() {
        assert_eq!(ProcessStep::from("thumb"), ProcessStep::new("thumb"));
        assert_eq!(
            ProcessStep::from(("resize", vec![json!(1), json!(2)])),
            ProcessStep::with_args("resize", vec![json!(1), json!(2)])
        );
    }

    #[test]
    fn test_steps_keep_declaration_order() {
        let mut registry = ProcessorRegistry::new();
        registry.define("a", Noop);
        registry.define("b", Noop);
        registry.process(["a"]);
        registry.process([
            ProcessStep::from(("b", vec![json!(1), json!(2)])),
            ProcessStep::from("a"),
        ]);

        let names: Vec<&str> = registry.steps().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
        assert_eq!(registry.steps()[1].args, vec![json!(1), json!(2)]);
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_undefined_step_rejected() {
        let mut registry = ProcessorRegistry::new();
        registry.define("a", Noop);
        registry.process(["a", "missing"]);

        assert!(matches!(
            registry.validate(),
            Err(UploaderError::UnknownProcessor(name)) if name == "missing"
        ));
    }
}
