//! Validated, ordered step lists.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::error::{Result, StackwireError};
use crate::steps::Step;

/// An ordered list of steps in which every step reads only outputs of
/// strictly earlier steps.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    /// Validate and wrap a step list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPipeline` for empty or duplicate step names, names
    /// containing `.`, duplicate outputs, or an input key that no earlier
    /// step produces.
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        let invalid = |message: String| StackwireError::InvalidPipeline { message };

        let mut names = HashSet::new();
        let mut produced: HashSet<String> = HashSet::new();
        let producers: HashMap<String, &str> = steps
            .iter()
            .flat_map(|s| s.output_keys().into_iter().map(move |k| (k, s.name.as_str())))
            .collect();

        for step in &steps {
            if step.name.trim().is_empty() {
                return Err(invalid("step names must not be empty".to_string()));
            }
            if step.name.contains('.') {
                return Err(invalid(format!(
                    "step name '{}' must not contain '.'",
                    step.name
                )));
            }
            if !names.insert(step.name.as_str()) {
                return Err(invalid(format!("duplicate step name '{}'", step.name)));
            }

            for key in step.input_keys() {
                if produced.contains(&key) {
                    continue;
                }
                let message = match producers.get(&key) {
                    Some(later) if *later == step.name => format!(
                        "step '{}' reads its own output '{}'",
                        step.name, key
                    ),
                    Some(later) => format!(
                        "step '{}' reads '{}', which is only produced later by '{}'",
                        step.name, key, later
                    ),
                    None => format!(
                        "step '{}' reads '{}', which no step produces",
                        step.name, key
                    ),
                };
                return Err(invalid(message));
            }

            for key in step.output_keys() {
                if !produced.insert(key.clone()) {
                    return Err(invalid(format!("output '{}' is declared twice", key)));
                }
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Look up a step by name.
    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Every output key any step declares.
    pub fn output_keys(&self) -> BTreeSet<String> {
        self.steps.iter().flat_map(Step::output_keys).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::ResourceKind;

    fn producer(name: &str, field: &str) -> Step {
        Step::create(name, ResourceKind::Identity)
            .output(field, format!("/{}", field))
            .build()
    }

    fn consumer(name: &str, key: &str) -> Step {
        Step::create(name, ResourceKind::RoleAssignment)
            .reference("principal_id", key)
            .build()
    }

    #[test]
    fn accepts_forward_flow() {
        let pipeline = Pipeline::new(vec![
            producer("identity", "principalId"),
            consumer("role", "identity.principalId"),
        ])
        .unwrap();
        assert_eq!(pipeline.len(), 2);
        assert!(pipeline.get("role").is_some());
        assert!(pipeline.output_keys().contains("identity.principalId"));
    }

    #[test]
    fn rejects_reads_of_later_outputs() {
        let err = Pipeline::new(vec![
            consumer("role", "identity.principalId"),
            producer("identity", "principalId"),
        ])
        .unwrap_err();
        assert!(matches!(err, StackwireError::InvalidPipeline { .. }));
        assert!(err.to_string().contains("only produced later by 'identity'"));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Pipeline::new(vec![consumer("role", "vault.id")]).unwrap_err();
        assert!(err.to_string().contains("no step produces"));
    }

    #[test]
    fn rejects_self_reference() {
        let step = Step::create("image", ResourceKind::ImageBuild)
            .output("loginServer", "/loginServer")
            .derived("ref", "${image.loginServer}/app")
            .build();
        let err = Pipeline::new(vec![step]).unwrap_err();
        assert!(err.to_string().contains("reads its own output"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Pipeline::new(vec![
            producer("identity", "principalId"),
            producer("identity", "clientId"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate step name"));
    }

    #[test]
    fn rejects_dotted_names() {
        let err = Pipeline::new(vec![producer("a.b", "x")]).unwrap_err();
        assert!(err.to_string().contains("must not contain '.'"));
    }

    #[test]
    fn rejects_duplicate_outputs_within_a_step() {
        let step = Step::create("identity", ResourceKind::Identity)
            .output("id", "/id")
            .output("id", "/name")
            .build();
        let err = Pipeline::new(vec![step]).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn empty_pipeline_is_valid() {
        assert!(Pipeline::new(Vec::new()).unwrap().is_empty());
    }
}
