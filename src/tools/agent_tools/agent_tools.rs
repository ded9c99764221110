//! Builds the delegation tool set for a group of coworkers.

use std::sync::Arc;

use super::delegate_work_tool::DelegateWorkTool;
use crate::agent::AgentRef;
use crate::context::ExecutionContext;
use crate::tools::base_tool::BaseTool;

/// One delegation tool per coworker.
pub struct AgentTools {
    agents: Vec<AgentRef>,
    ctx: ExecutionContext,
}

impl AgentTools {
    pub fn new(agents: Vec<AgentRef>, ctx: ExecutionContext) -> Self {
        Self { agents, ctx }
    }

    /// Coworkers of `agent`: everyone in `agents` except `agent` itself.
    pub fn for_agent(agent: &AgentRef, agents: &[AgentRef], ctx: ExecutionContext) -> Self {
        let coworkers = agents
            .iter()
            .filter(|other| !Arc::ptr_eq(other, agent))
            .cloned()
            .collect();
        Self::new(coworkers, ctx)
    }

    pub fn tools(&self) -> Vec<Arc<dyn BaseTool>> {
        let roles: Vec<String> = self.agents.iter().map(|a| a.read().role.clone()).collect();
        self.agents
            .iter()
            .map(|agent| {
                Arc::new(DelegateWorkTool::new(
                    Arc::clone(agent),
                    roles.clone(),
                    self.ctx.clone(),
                )) as Arc<dyn BaseTool>
            })
            .collect()
    }
}
