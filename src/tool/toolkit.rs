//! Tool registry with activatable groups.

use std::sync::Arc;

use tracing::{debug, warn};

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolContext};
use super::types::ToolSchema;
use super::validation::validate_arguments;
use crate::error::{AgentScopeError, Result};
use crate::message::{ContentBlock, ToolResultBlock, ToolUseBlock};

/// Group every tool belongs to unless told otherwise. Always active.
pub const BASIC_GROUP: &str = "basic";

/// A named set of tools that can be switched on and off together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolGroup {
    pub name: String,
    pub description: String,
    pub active: bool,
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    group: String,
}

/// Holds tools, exposes schemas of the active ones, and executes calls.
#[derive(Default)]
pub struct Toolkit {
    tools: Vec<RegisteredTool>,
    groups: Vec<ToolGroup>,
}

impl Toolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool in the basic group.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<()> {
        self.register_arc(Arc::new(tool), BASIC_GROUP)
    }

    /// Register a tool in a previously created group.
    pub fn register_in_group(&mut self, tool: impl Tool + 'static, group: &str) -> Result<()> {
        self.register_arc(Arc::new(tool), group)
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>, group: &str) -> Result<()> {
        if group != BASIC_GROUP && self.group(group).is_none() {
            return Err(AgentScopeError::Configuration(format!(
                "tool group '{group}' does not exist; create it first"
            )));
        }
        if self.get(tool.name()).is_some() {
            return Err(AgentScopeError::Configuration(format!(
                "a tool named '{}' is already registered",
                tool.name()
            )));
        }
        debug!(tool = tool.name(), group, "Registered tool");
        self.tools.push(RegisteredTool {
            tool,
            group: group.to_string(),
        });
        Ok(())
    }

    /// Remove a tool by name. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.tools.len();
        self.tools.retain(|entry| entry.tool.name() != name);
        before != self.tools.len()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|entry| entry.tool.name() == name)
            .map(|entry| &entry.tool)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn create_tool_group(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        active: bool,
    ) -> Result<()> {
        let name = name.into();
        if name == BASIC_GROUP || self.group(&name).is_some() {
            return Err(AgentScopeError::Configuration(format!(
                "tool group '{name}' already exists"
            )));
        }
        self.groups.push(ToolGroup {
            name,
            description: description.into(),
            active,
        });
        Ok(())
    }

    /// Activate or deactivate groups. The basic group and unknown names are
    /// skipped with a warning.
    pub fn update_tool_groups(&mut self, names: &[&str], active: bool) {
        for name in names {
            if *name == BASIC_GROUP {
                warn!("The basic tool group is always active");
                continue;
            }
            match self.groups.iter_mut().find(|g| g.name == *name) {
                Some(group) => group.active = active,
                None => warn!(group = name, "Unknown tool group"),
            }
        }
    }

    /// Delete groups together with their tools.
    pub fn remove_tool_groups(&mut self, names: &[&str]) {
        self.groups.retain(|g| !names.contains(&g.name.as_str()));
        self.tools
            .retain(|entry| entry.group == BASIC_GROUP || !names.contains(&entry.group.as_str()));
    }

    pub fn groups(&self) -> &[ToolGroup] {
        &self.groups
    }

    /// Usage notes of active non-basic groups, for inclusion in a system prompt.
    pub fn activated_notes(&self) -> Option<String> {
        let notes: Vec<String> = self
            .groups
            .iter()
            .filter(|g| g.active)
            .map(|g| format!("## {}\n{}", g.name, g.description))
            .collect();
        if notes.is_empty() {
            None
        } else {
            Some(format!("# Activated tool groups\n{}", notes.join("\n")))
        }
    }

    /// Schemas of tools in active groups, in registration order.
    pub fn json_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .filter(|entry| self.is_active(&entry.group))
            .map(|entry| entry.tool.schema())
            .collect()
    }

    /// Run a requested call. Failures are reported inside the result.
    pub async fn call_tool(&self, call: &ToolUseBlock) -> ToolResultBlock {
        let output = match self.try_call(call).await {
            Ok(content) => content,
            Err(text) => {
                warn!(tool = call.name.as_str(), error = text.as_str(), "Tool call failed");
                vec![ContentBlock::text(text)]
            }
        };
        ToolResultBlock::new(call.id.clone(), call.name.clone(), output)
    }

    async fn try_call(&self, call: &ToolUseBlock) -> std::result::Result<Vec<ContentBlock>, String> {
        let entry = self
            .tools
            .iter()
            .find(|entry| entry.tool.name() == call.name)
            .ok_or_else(|| {
                format!(
                    "FunctionNotFoundError: Cannot find the function named {}.",
                    call.name
                )
            })?;

        if !self.is_active(&entry.group) {
            return Err(format!(
                "FunctionInactiveError: The function '{}' belongs to the inactive tool group '{}'.",
                call.name, entry.group
            ));
        }

        let args = ToolArguments::parse(&call.input)
            .map_err(|e| format!("InvalidArgumentsError: {e}"))?;
        validate_arguments(args.raw(), &entry.tool.parameters().schema)
            .map_err(|e| format!("InvalidArgumentsError: {e}"))?;

        let ctx = ToolContext {
            call_id: call.id.clone(),
            ..Default::default()
        };
        debug!(tool = call.name.as_str(), call_id = call.id.as_str(), "Executing tool");
        entry
            .tool
            .execute(&args, &ctx)
            .await
            .map(|response| response.content)
            .map_err(|e| format!("Error: {e}"))
    }

    fn group(&self, name: &str) -> Option<&ToolGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    fn is_active(&self, group: &str) -> bool {
        group == BASIC_GROUP || self.group(group).is_some_and(|g| g.active)
    }
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit")
            .field(
                "tools",
                &self.tools.iter().map(|e| e.tool.name()).collect::<Vec<_>>(),
            )
            .field("groups", &self.groups)
            .finish()
    }
}
