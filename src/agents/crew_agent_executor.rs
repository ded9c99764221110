//! The ReAct reasoning loop that drives an agent through one task.
//!
//! Each iteration passes the rate limiter, asks the model for the next step
//! and either finishes, runs a tool through the tool invocation engine, or
//! feeds the parser error back to the model. Model backend errors are the
//! only thing that leaves the loop as an `Err`.

use std::sync::Arc;

use super::parser::{parse, AgentStep};
use crate::agent::{Agent, StepCallback};
use crate::context::ExecutionContext;
use crate::llms::base_llm::{BaseLLM, LLMMessage};
use crate::task::Task;
use crate::tools::tool_registry::ToolRegistry;
use crate::tools::tool_usage::ToolUsage;
use crate::utilities::errors::LLMError;
use crate::utilities::logger::PrinterColor;
use crate::utilities::string_utils::format_template;

pub struct CrewAgentExecutor<'a> {
    agent: &'a Agent,
    task: &'a mut Task,
    ctx: &'a ExecutionContext,
    registry: ToolRegistry,
    function_calling_llm: Arc<dyn BaseLLM>,
    step_callback: Option<StepCallback>,
    /// Conversation so far.
    pub messages: Vec<LLMMessage>,
    pub iterations: usize,
    pub max_iter: usize,
}

impl<'a> CrewAgentExecutor<'a> {
    pub fn new(
        agent: &'a Agent,
        task: &'a mut Task,
        registry: ToolRegistry,
        ctx: &'a ExecutionContext,
    ) -> Self {
        let function_calling_llm = agent
            .function_calling_llm
            .clone()
            .unwrap_or_else(|| Arc::clone(&agent.llm));
        agent.tools_handler.lock().cache = ctx.cache.clone();
        Self {
            agent,
            task,
            ctx,
            registry,
            function_calling_llm,
            step_callback: agent.step_callback.clone(),
            messages: Vec::new(),
            iterations: 0,
            max_iter: agent.max_iter,
        }
    }

    /// Run the loop until the agent gives a final answer.
    pub fn invoke(&mut self, prompt: String) -> Result<String, LLMError> {
        self.messages.push(LLMMessage::user(prompt));

        loop {
            if self.iterations >= self.max_iter {
                return self.force_final_answer();
            }

            let reply = self.call_llm()?;
            self.iterations += 1;

            match parse(&reply) {
                Ok(AgentStep::Finish(finish)) => {
                    self.on_step(&AgentStep::Finish(finish.clone()));
                    self.agent.logger().log(
                        "debug",
                        &format!("== [{}] Final Answer: {}", self.agent.role, finish.output),
                        Some(PrinterColor::BoldGreen),
                    );
                    return Ok(finish.output);
                }
                Ok(AgentStep::Action(mut action)) => {
                    let mut tools_handler = self.agent.tools_handler.lock();
                    let observation = ToolUsage::new(
                        &mut tools_handler,
                        &self.registry,
                        &mut *self.task,
                        Arc::clone(&self.function_calling_llm),
                        self.ctx,
                    )
                    .use_tool(&reply);
                    drop(tools_handler);

                    self.agent.logger().print(
                        &format!("Action: {}\nObservation: {}", action.tool, observation),
                        PrinterColor::Cyan,
                    );
                    action.result = Some(observation.clone());
                    self.on_step(&AgentStep::Action(action));
                    self.append_observation(reply, &observation);
                }
                Err(err) => {
                    log::debug!("[{}] unparsable reply: {}", self.agent.role, err);
                    let feedback = format_template(
                        &self.ctx.i18n.errors("unexpected_format"),
                        &[("error", &err.error)],
                    );
                    self.append_observation(reply, &feedback);
                }
            }
        }
    }

    fn call_llm(&mut self) -> Result<String, LLMError> {
        self.ctx.wait_for_rpm();
        let response = self.agent.llm.call(&self.messages)?;
        self.agent.token_process.record(response.usage.as_ref());
        Ok(response.content)
    }

    fn append_observation(&mut self, reply: String, observation: &str) {
        let slice = self.ctx.i18n.slice("observation");
        self.messages.push(LLMMessage::assistant(reply));
        self.messages
            .push(LLMMessage::user(format!("{}{}", slice, observation)));
    }

    /// Out of iterations: demand an answer and take whatever comes back.
    fn force_final_answer(&mut self) -> Result<String, LLMError> {
        log::info!(
            "[{}] reached max iterations ({}), forcing a final answer",
            self.agent.role,
            self.max_iter
        );
        self.messages
            .push(LLMMessage::user(self.ctx.i18n.slice("force_final_answer")));
        let reply = self.call_llm()?;

        let output = match parse(&reply) {
            Ok(AgentStep::Finish(finish)) => finish.output,
            _ => reply.trim().to_string(),
        };
        Ok(output)
    }

    fn on_step(&self, step: &AgentStep) {
        if let Some(callback) = &self.step_callback {
            callback(step);
        }
    }
}
