//! Prompt assembly for the agent reasoning loop.

use crate::utilities::i18n::I18N;
use crate::utilities::string_utils::format_template;

/// Prompt slices that make up an agent's task prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptComponent {
    RolePlaying,
    Tools,
    NoTools,
    Task,
}

impl PromptComponent {
    fn as_str(&self) -> &'static str {
        match self {
            Self::RolePlaying => "role_playing",
            Self::Tools => "tools",
            Self::NoTools => "no_tools",
            Self::Task => "task",
        }
    }
}

/// Persona fields interpolated into the role-playing slice.
pub struct AgentInfo<'a> {
    pub role: &'a str,
    pub goal: &'a str,
    pub backstory: &'a str,
}

/// Builds the task prompt for an agent.
#[derive(Debug, Clone)]
pub struct Prompts<'a> {
    pub i18n: &'a I18N,
    /// Whether the agent runs with tools in this execution.
    pub has_tools: bool,
}

impl<'a> Prompts<'a> {
    pub fn new(i18n: &'a I18N, has_tools: bool) -> Self {
        Self { i18n, has_tools }
    }

    /// The prompt template for one task execution.
    ///
    /// Persona placeholders are filled; `{input}`, `{tools}` and
    /// `{tool_names}` are left for the executor.
    pub fn task_execution(&self, agent: &AgentInfo<'_>) -> String {
        let mut slices = vec![PromptComponent::RolePlaying];
        if self.has_tools {
            slices.push(PromptComponent::Tools);
        } else {
            slices.push(PromptComponent::NoTools);
        }
        slices.push(PromptComponent::Task);

        let prompt: String = slices
            .iter()
            .map(|c| self.i18n.slice(c.as_str()))
            .collect();

        format_template(
            &prompt,
            &[
                ("role", agent.role),
                ("goal", agent.goal),
                ("backstory", agent.backstory),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> AgentInfo<'static> {
        AgentInfo {
            role: "Researcher",
            goal: "Find facts",
            backstory: "A curious mind.",
        }
    }

    #[test]
    fn test_prompt_with_tools() {
        let i18n = I18N::default();
        let prompt = Prompts::new(&i18n, true).task_execution(&info());
        assert!(prompt.starts_with("You are Researcher. A curious mind."));
        assert!(prompt.contains("Your personal goal is: Find facts"));
        assert!(prompt.contains("{tool_names}"));
        assert!(prompt.contains("{input}"));
    }

    #[test]
    fn test_prompt_without_tools() {
        let i18n = I18N::default();
        let prompt = Prompts::new(&i18n, false).task_execution(&info());
        assert!(!prompt.contains("{tool_names}"));
        assert!(prompt.contains("Final Answer:"));
    }
}
