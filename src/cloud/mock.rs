//! Scripted resource client for tests.
//!
//! `MockClient` never touches a network. Every call is recorded, and a
//! synthesized payload is returned so that a fully successful run produces every
//! output a real control plane would. Failures can be scripted per kind or per
//! resource name.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde_json::{json, Value};

use crate::error::{Result, StackwireError};

use super::{
    ensure_required, extract_fields, resource_name, FieldSpec, Operation, Params,
    ResourceClient, ResourceDescriptor, ResourceKind,
};

/// Event log shared between test doubles to assert cross-component ordering.
pub type Journal = Rc<RefCell<Vec<String>>>;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: Operation,
    pub kind: ResourceKind,
    pub params: Params,
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    remaining: Option<u32>,
    cause: String,
}

/// In-memory [`ResourceClient`].
#[derive(Debug, Default)]
pub struct MockClient {
    calls: RefCell<Vec<MockCall>>,
    failures: RefCell<HashMap<ResourceKind, ScriptedFailure>>,
    named_failures: HashMap<String, String>,
    payloads: HashMap<ResourceKind, Value>,
    journal: Option<Journal>,
}

impl MockClient {
    /// A client where every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `"<operation>:<kind>:<name>"` to `journal` for every call.
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Fail the first `times` calls for `kind`, then succeed.
    pub fn fail_times(self, kind: ResourceKind, times: u32, cause: impl Into<String>) -> Self {
        self.failures.borrow_mut().insert(
            kind,
            ScriptedFailure {
                remaining: Some(times),
                cause: cause.into(),
            },
        );
        self
    }

    /// Fail every call for `kind`.
    pub fn fail_always(self, kind: ResourceKind, cause: impl Into<String>) -> Self {
        self.failures.borrow_mut().insert(
            kind,
            ScriptedFailure {
                remaining: None,
                cause: cause.into(),
            },
        );
        self
    }

    /// Fail every call whose target resource has this name.
    pub fn fail_named(mut self, name: impl Into<String>, cause: impl Into<String>) -> Self {
        self.named_failures.insert(name.into(), cause.into());
        self
    }

    /// Return this payload (plus an `id`, if absent) for every call on `kind`.
    pub fn with_payload(mut self, kind: ResourceKind, payload: Value) -> Self {
        self.payloads.insert(kind, payload);
        self
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.borrow().clone()
    }

    /// Calls made for one kind.
    pub fn calls_for(&self, kind: ResourceKind) -> Vec<MockCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn record(&self, operation: Operation, kind: ResourceKind, params: &Params) -> Result<Value> {
        let name = resource_name(kind, params);
        self.calls.borrow_mut().push(MockCall {
            operation,
            kind,
            params: params.clone(),
        });
        if let Some(journal) = &self.journal {
            journal
                .borrow_mut()
                .push(format!("{}:{}:{}", operation, kind.as_str(), name));
        }

        if let Some(cause) = self.named_failures.get(&name) {
            return Err(StackwireError::ProvisioningError {
                kind,
                name,
                cause: cause.clone(),
            });
        }

        if let Some(failure) = self.failures.borrow_mut().get_mut(&kind) {
            let fire = match failure.remaining.as_mut() {
                None => true,
                Some(0) => false,
                Some(n) => {
                    *n -= 1;
                    true
                }
            };
            if fire {
                return Err(StackwireError::ProvisioningError {
                    kind,
                    name,
                    cause: failure.cause.clone(),
                });
            }
        }

        let mut payload = self
            .payloads
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| synthesize(kind, &name, params));
        if let Value::Object(map) = &mut payload {
            map.entry("id")
                .or_insert_with(|| Value::String(format!("/mock/{}/{}", kind.as_str(), name)));
        }
        Ok(payload)
    }
}

impl ResourceClient for MockClient {
    fn create(&self, kind: ResourceKind, params: &Params) -> Result<ResourceDescriptor> {
        ensure_required(kind, params)?;
        let payload = self.record(Operation::Create, kind, params)?;
        Ok(ResourceDescriptor::from_payload(kind, params, payload))
    }

    fn show(
        &self,
        kind: ResourceKind,
        selector: &Params,
        fields: &[FieldSpec],
    ) -> Result<BTreeMap<String, String>> {
        ensure_required(kind, selector)?;
        let payload = self.record(Operation::Show, kind, selector)?;
        extract_fields(kind, &resource_name(kind, selector), &payload, fields)
    }
}

/// Payload shaped like the fields the real control plane returns for `kind`.
fn synthesize(kind: ResourceKind, name: &str, params: &Params) -> Value {
    match kind {
        ResourceKind::Account => json!({
            "id": "00000000-0000-0000-0000-00000000beef",
            "tenantId": "00000000-0000-0000-0000-00000000cafe",
            "name": "mock-subscription",
        }),
        ResourceKind::SignedInUser => json!({
            "id": "00000000-0000-0000-0000-00000000f00d",
            "userPrincipalName": "operator@example.com",
        }),
        ResourceKind::Identity => json!({
            "name": name,
            "principalId": format!("principal-{}", name),
            "clientId": format!("client-{}", name),
        }),
        ResourceKind::CosmosAccount => json!({
            "name": name,
            "documentEndpoint": format!("https://{}.documents.azure.com:443/", name),
        }),
        ResourceKind::KeyVault => json!({
            "name": name,
            "properties": { "vaultUri": format!("https://{}.vault.azure.net/", name) },
        }),
        ResourceKind::Registry => json!({
            "name": name,
            "loginServer": format!("{}.azurecr.io", name),
        }),
        ResourceKind::ContainerEnvironment => json!({
            "name": name,
            "properties": { "defaultDomain": format!("{}.eastus.azurecontainerapps.io", name) },
        }),
        ResourceKind::ContainerApp => {
            let env = params.get("environment").map(String::as_str).unwrap_or("env");
            json!({
                "name": name,
                "properties": {
                    "configuration": {
                        "ingress": { "fqdn": format!("{}.{}.azurecontainerapps.io", name, env) }
                    }
                },
            })
        }
        _ => json!({ "name": name }),
    }
}
