//! Tool registry - resolves action strings and dispatches tool calls
//!
//! An action looks like `prediction_tool(patient_id=2)`. The registry checks
//! the tool name against the registered set, extracts the single integer
//! argument, runs the tool against the shared context and always hands back
//! a `ToolResult`, never an error.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::{PatientId, ToolName, ToolResult};
use crate::tools::clinical::{ExplanationTool, NotesTool, PredictionTool};
use crate::tools::context::ToolContext;
use crate::tools::PatientTool;

/// Content of the parentheses: one integer, optionally as `name=<int>` or `name: <int>`
static ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:([A-Za-z_][A-Za-z0-9_]*)\s*[=:]\s*)?["']?(-?\d+)["']?\s*$"#)
        .expect("argument pattern is valid")
});

/// A validated tool request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRequest {
    pub tool: ToolName,
    pub patient_id: PatientId,
}

/// Why an action string could not be turned into a tool call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAction {
    #[error("no action was provided")]
    Empty,

    #[error("'{0}' is not a tool call of the form tool_name(patient_id=<int>)")]
    NotACall(String),

    #[error("unknown tool '{name}'. Available tools: {available}")]
    UnknownTool { name: String, available: String },

    #[error("{tool} expects a single integer {parameter} argument, got '{found}'")]
    BadArgument {
        tool: ToolName,
        parameter: &'static str,
        found: String,
    },
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn PatientTool>>,
    context: Arc<ToolContext>,
}

impl ToolRegistry {
    /// Create a registry with the three clinical tools
    pub fn new(context: Arc<ToolContext>) -> Self {
        let mut registry = Self::empty(context);
        registry.register(Arc::new(PredictionTool::new()));
        registry.register(Arc::new(ExplanationTool::new()));
        registry.register(Arc::new(NotesTool::new()));
        registry
    }

    /// Create a registry with no tools registered
    pub fn empty(context: Arc<ToolContext>) -> Self {
        Self {
            tools: BTreeMap::new(),
            context,
        }
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn PatientTool>) {
        self.tools.insert(tool.name(), tool);
    }

    /// Registered tool names, in fixed order
    pub fn tool_names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Bullet list of tool signatures for the instructions
    pub fn describe(&self) -> String {
        self.tools
            .keys()
            .map(|name| format!("- {}: {}", name.signature(), name.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Turn an action string into a validated request
    pub fn parse_action(&self, action: &str) -> Result<ActionRequest, InvalidAction> {
        let action = action.trim();
        if action.is_empty() {
            return Err(InvalidAction::Empty);
        }

        let (raw_name, rest) = action
            .split_once('(')
            .ok_or_else(|| InvalidAction::NotACall(action.to_string()))?;
        let args = rest
            .split_once(')')
            .map(|(inside, _)| inside)
            .ok_or_else(|| InvalidAction::NotACall(action.to_string()))?;

        let name = raw_name.trim().trim_matches('`').trim();
        let tool = name
            .parse::<ToolName>()
            .ok()
            .filter(|tool| self.tools.contains_key(tool))
            .ok_or_else(|| InvalidAction::UnknownTool {
                name: name.to_string(),
                available: self.available(),
            })?;

        let bad_argument = || InvalidAction::BadArgument {
            tool,
            parameter: tool.parameter(),
            found: args.trim().to_string(),
        };

        let captures = ARGUMENT.captures(args).ok_or_else(bad_argument)?;
        if let Some(keyword) = captures.get(1) {
            if keyword.as_str() != tool.parameter() {
                return Err(bad_argument());
            }
        }
        let patient_id = captures[2]
            .parse::<i64>()
            .map(PatientId)
            .map_err(|_| bad_argument())?;

        Ok(ActionRequest { tool, patient_id })
    }

    /// Resolve and run an action string
    pub fn dispatch(&self, action: &str) -> ToolResult {
        match self.parse_action(action) {
            Ok(request) => self.execute(request),
            Err(e) => {
                warn!(action, error = %e, "Invalid action");
                ToolResult::failure(None, format!("Failed to execute tool: {}", e))
            }
        }
    }

    /// Execute a validated request
    pub fn execute(&self, request: ActionRequest) -> ToolResult {
        let ActionRequest { tool, patient_id } = request;

        let Some(handler) = self.tools.get(&tool) else {
            return ToolResult::failure(
                Some(patient_id),
                format!("Failed to execute tool: {} is not registered", tool),
            );
        };

        debug!(%tool, %patient_id, "Executing tool");
        match handler.invoke(patient_id, &self.context) {
            Ok(payload) => ToolResult::success(tool, patient_id, payload),
            Err(e) => ToolResult::failure(Some(patient_id), e.to_string()),
        }
    }

    fn available(&self) -> String {
        self.tools
            .keys()
            .map(|t| t.call_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Arc::new(ToolContext::default()))
    }
}
