//! Declarative crew definitions.
//!
//! A config is a mapping with `agents` and `tasks` lists and an optional
//! `process`, written in JSON or YAML. Tasks name their agent by role. The
//! autonomous planner answers in the same shape, so both go through
//! [`CrewConfig::into_builder`].

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::{Agent, AgentRef};
use crate::crew::CrewBuilder;
use crate::llms::base_llm::BaseLLM;
use crate::process::Process;
use crate::task::Task;
use crate::tools::base_tool::BaseTool;
use crate::tools::tool_registry::ToolRegistry;
use crate::utilities::errors::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Names of catalogue tools the agent may use.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub allow_delegation: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub max_iter: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub description: String,
    pub expected_output: String,
    /// Role of the agent that owns the task.
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub async_execution: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewConfig {
    #[serde(default)]
    pub process: Option<Process>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

fn invalid(e: impl std::fmt::Display) -> ConfigurationError {
    ConfigurationError::InvalidConfig(e.to_string())
}

impl CrewConfig {
    pub fn from_json(content: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(content).map_err(invalid)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_yaml::from_str(content).map_err(invalid)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_value(value).map_err(invalid)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("{}: {}", path.display(), e)))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.agents.is_empty() || self.tasks.is_empty() {
            return Err(ConfigurationError::MissingConfigKeys);
        }
        for task in &self.tasks {
            if let Some(role) = &task.agent {
                if !self.agents.iter().any(|a| &a.role == role) {
                    return Err(ConfigurationError::UnknownAgentRole {
                        task: task.description.clone(),
                        role: role.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Materialize the agents (all backed by `llm`) and tasks.
    ///
    /// Agent tool names are looked up in `catalogue`; names that are not
    /// there are skipped with a warning.
    pub fn into_parts(
        self,
        llm: &Arc<dyn BaseLLM>,
        catalogue: &[Arc<dyn BaseTool>],
    ) -> Result<(Option<Process>, Vec<AgentRef>, Vec<Task>), ConfigurationError> {
        self.validate()?;
        let registry = ToolRegistry::new(catalogue);

        let agents: Vec<AgentRef> = self
            .agents
            .into_iter()
            .map(|config| {
                let tools = config
                    .tools
                    .iter()
                    .filter_map(|name| match registry.resolve(name) {
                        Ok(tool) => Some(tool),
                        Err(_) => {
                            log::warn!("Agent '{}' asks for unknown tool '{}'", config.role, name);
                            None
                        }
                    })
                    .collect();
                let mut agent = Agent::new(config.role, config.goal, config.backstory, Arc::clone(llm))
                    .with_tools(tools)
                    .with_allow_delegation(config.allow_delegation)
                    .with_verbose(config.verbose);
                if let Some(max_iter) = config.max_iter {
                    agent = agent.with_max_iter(max_iter);
                }
                agent.into_ref()
            })
            .collect();

        let tasks = self
            .tasks
            .into_iter()
            .map(|config| {
                let mut task = Task::new(config.description, config.expected_output)
                    .with_async_execution(config.async_execution);
                if let Some(role) = config.agent {
                    task.agent = agents.iter().find(|a| a.read().role == role).cloned();
                }
                task
            })
            .collect();

        Ok((self.process, agents, tasks))
    }

    /// A builder pre-filled with this config's agents, tasks and process.
    pub fn into_builder(
        self,
        llm: &Arc<dyn BaseLLM>,
        catalogue: &[Arc<dyn BaseTool>],
    ) -> Result<CrewBuilder, ConfigurationError> {
        let (process, agents, tasks) = self.into_parts(llm, catalogue)?;
        let mut builder = CrewBuilder::new().agents(agents).tasks(tasks);
        if let Some(process) = process {
            builder = builder.process(process);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLLM;
    use crate::tools::base_tool::Tool;
    use serde_json::json;

    const YAML: &str = r#"
process: sequential
agents:
  - role: Researcher
    goal: Find facts about {topic}
    backstory: Curious
    tools: [search, teleport]
  - role: Writer
    goal: Write
    backstory: Wordy
    allow_delegation: true
tasks:
  - description: Research {topic}
    expected_output: Facts
    agent: Researcher
  - description: Write it up
    expected_output: An article
    agent: Writer
"#;

    #[test]
    fn test_yaml_config_builds_parts() {
        let config = CrewConfig::from_yaml(YAML).unwrap();
        let llm: Arc<dyn BaseLLM> = ScriptedLLM::new(["x"]);
        let search = Tool::new("Search", "web", |_| Ok(json!("r"))).into_shared();

        let (process, agents, tasks) = config.into_parts(&llm, &[search]).unwrap();
        assert_eq!(process, Some(Process::Sequential));
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].read().tools.len(), 1);
        assert!(agents[1].read().allow_delegation);
        assert!(Arc::ptr_eq(tasks[1].agent.as_ref().unwrap(), &agents[1]));
    }

    #[test]
    fn test_missing_tasks_rejected() {
        let err = CrewConfig::from_json(r#"{"agents": [{"role": "a", "goal": "g", "backstory": "b"}]}"#)
            .unwrap_err();
        assert_eq!(err, ConfigurationError::MissingConfigKeys);
    }

    #[test]
    fn test_missing_agents_rejected() {
        let err = CrewConfig::from_value(json!({
            "tasks": [{"description": "d", "expected_output": "e"}]
        }))
        .unwrap_err();
        assert_eq!(err, ConfigurationError::MissingConfigKeys);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = CrewConfig::from_value(json!({
            "agents": [{"role": "Writer", "goal": "g", "backstory": "b"}],
            "tasks": [{"description": "d", "expected_output": "e", "agent": "Chef"}]
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownAgentRole { ref role, .. } if role == "Chef"));
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crew.yml");
        std::fs::write(&path, YAML).unwrap();
        let config = CrewConfig::from_path(&path).unwrap();
        assert_eq!(config.tasks.len(), 2);
    }
}
