//! Tool exposure decisions

use std::sync::Arc;

use super::policy::PolicyClient;
use super::principal::Principal;

/// Whether a tool without a required permission needs a caller at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAccess {
    Public,
    Authenticated,
}

/// Static description of a protected operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub required_permission: Option<&'static str>,
    pub access: ToolAccess,
    /// Also subject to the fine-grained policy service
    pub policy_checked: bool,
    pub read_only: bool,
    pub destructive: bool,
}

impl ToolDescriptor {
    pub const fn new(name: &'static str, title: &'static str, description: &'static str) -> Self {
        Self {
            name,
            title,
            description,
            required_permission: None,
            access: ToolAccess::Public,
            policy_checked: false,
            read_only: false,
            destructive: false,
        }
    }

    #[must_use]
    pub const fn requires(mut self, permission: &'static str) -> Self {
        self.required_permission = Some(permission);
        self
    }

    #[must_use]
    pub const fn authenticated(mut self) -> Self {
        self.access = ToolAccess::Authenticated;
        self
    }

    #[must_use]
    pub const fn policy_checked(mut self) -> Self {
        self.policy_checked = true;
        self
    }

    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub const fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }
}

/// Permission gate evaluated on every listing and invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessGate {
    enabled: bool,
}

impl AccessGate {
    pub const fn enabled() -> Self {
        Self { enabled: true }
    }

    /// Gate for unauthenticated deployments; exposes every tool
    pub const fn disabled() -> Self {
        Self { enabled: false }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn should_expose(&self, tool: &ToolDescriptor, principal: Option<&Principal>) -> bool {
        if !self.enabled {
            return true;
        }
        match (tool.required_permission, tool.access) {
            (Some(permission), _) => principal.is_some_and(|p| p.has_permission(permission)),
            (None, ToolAccess::Public) => true,
            (None, ToolAccess::Authenticated) => principal.is_some(),
        }
    }
}

/// Permission gate followed by the policy service
#[derive(Debug, Clone)]
pub struct ToolAuthorizer {
    gate: AccessGate,
    policy: Arc<PolicyClient>,
}

impl ToolAuthorizer {
    pub const fn new(gate: AccessGate, policy: Arc<PolicyClient>) -> Self {
        Self { gate, policy }
    }

    pub const fn gate(&self) -> AccessGate {
        self.gate
    }

    pub fn policy(&self) -> &PolicyClient {
        &self.policy
    }

    /// Tools from `catalog` the caller may see, in catalog order
    pub async fn visible_tools<'a>(
        &self,
        catalog: &'a [ToolDescriptor],
        principal: Option<&Principal>,
    ) -> Vec<&'a ToolDescriptor> {
        let exposed: Vec<&ToolDescriptor> = catalog
            .iter()
            .filter(|tool| self.gate.should_expose(tool, principal))
            .collect();

        if !self.gate.is_enabled() || !self.policy.is_configured() {
            return exposed;
        }

        let checked: Vec<&str> = exposed
            .iter()
            .filter(|tool| tool.policy_checked)
            .map(|tool| tool.name)
            .collect();
        if checked.is_empty() {
            return exposed;
        }

        let Some(principal) = principal else {
            return exposed.into_iter().filter(|t| !t.policy_checked).collect();
        };

        let decisions = self
            .policy
            .batch_check(&principal.identity_id, &checked)
            .await;
        exposed
            .into_iter()
            .filter(|tool| {
                !tool.policy_checked || decisions.get(tool.name).copied().unwrap_or(false)
            })
            .collect()
    }

    /// Same rule as [`Self::visible_tools`] for a single invocation
    pub async fn authorize(&self, tool: &ToolDescriptor, principal: Option<&Principal>) -> bool {
        if !self.gate.should_expose(tool, principal) {
            return false;
        }
        if !self.gate.is_enabled() || !tool.policy_checked || !self.policy.is_configured() {
            return true;
        }
        match principal {
            Some(principal) => self.policy.check(&principal.identity_id, tool.name).await,
            None => false,
        }
    }
}
