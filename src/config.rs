//! Per-route adapter configuration.

use std::collections::HashMap;

use serde::Deserialize;

use crate::request::RequestContext;

/// Everything an adapter needs to know about the route it serves.
///
/// Supplied once, when the adapter is built, and never touched again. Build
/// it in code:
///
/// ```rust
/// use proxy_shim::AdapterConfig;
///
/// let config = AdapterConfig::new("/users/{userId}")
///     .with_stage_variable("table", "users-dev");
/// ```
///
/// or load it from JSON with the same field names API Gateway uses:
///
/// ```rust
/// # use proxy_shim::AdapterConfig;
/// let config: AdapterConfig = serde_json::from_str(r#"{
///     "resourceTemplate": "/users/{userId}",
///     "stageVariables": { "table": "users-dev" }
/// }"#).unwrap();
/// assert_eq!(config.stage_variables()["table"], "users-dev");
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    resource_template: String,
    #[serde(default)]
    stage_variables: HashMap<String, String>,
    #[serde(default)]
    request_context: Option<RequestContext>,
}

impl AdapterConfig {
    pub fn new(resource_template: impl Into<String>) -> Self {
        Self {
            resource_template: resource_template.into(),
            stage_variables: HashMap::new(),
            request_context: None,
        }
    }

    pub fn with_stage_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.stage_variables.insert(name.into(), value.into());
        self
    }

    /// Replaces all stage variables.
    pub fn with_stage_variables(mut self, vars: HashMap<String, String>) -> Self {
        self.stage_variables = vars;
        self
    }

    pub fn with_request_context(mut self, ctx: RequestContext) -> Self {
        self.request_context = Some(ctx);
        self
    }

    pub fn resource_template(&self) -> &str { &self.resource_template }
    pub fn stage_variables(&self) -> &HashMap<String, String> { &self.stage_variables }
    pub fn request_context(&self) -> Option<&RequestContext> { self.request_context.as_ref() }
}
