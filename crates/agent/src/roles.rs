//! The four agent roles and how they are wired together.
//!
//! - `planner`: LLM-backed, suggests plans and reviews results
//! - `planner_user`: the planner's proxy; never auto-replies
//! - `assistant`: LLM-backed executor, offered the `ask_planner` tool
//! - `user_proxy`: speaks for the user, executes `ask_planner`, stops on the
//!   termination sentinel
//!
//! Every role is wrapped in a [`TrackedAgent`] so that everything any of them
//! receives reaches the transcript.

use relaychat_config::AppConfig;
use relaychat_core::agent::Agent;
use relaychat_core::event::{EventBus, MessageListener};
use relaychat_core::provider::Provider;
use relaychat_core::tool::{Tool, ToolRegistry};
use std::sync::Arc;

use crate::conversable::{ConversableAgent, LlmSettings};
use crate::planner::AskPlannerTool;
use crate::termination::TerminationSentinel;
use crate::tracked::{EventBusListener, TrackedAgent, TranscriptListener};

pub const PLANNER: &str = "planner";
pub const PLANNER_USER: &str = "planner_user";
pub const ASSISTANT: &str = "assistant";
pub const USER_PROXY: &str = "user_proxy";

pub const PLANNER_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant. You suggest coding and reasoning steps for another AI assistant to accomplish a task. Do not suggest concrete code. For any action beyond writing code or reasoning, convert it to a step that can be implemented by writing code. For example, browsing the web can be implemented by writing code that reads and prints the content of a web page. Finally, inspect the execution result. If the plan is not good, suggest a better plan. If the execution is wrong, analyze the error and suggest a fix.";

pub const ASSISTANT_SYSTEM_MESSAGE: &str = "You are a helpful AI assistant. Solve tasks using your coding and language skills. When a task needs a plan, or when you need a plan or its execution result verified, call the ask_planner function and include enough context in your question. Explain your reasoning step by step and show any code in full. When the task is done, give the final answer and end your message with TERMINATE.";

/// The process-wide agents.
pub struct AgentRoster {
    pub planner: Arc<dyn Agent>,
    pub planner_user: Arc<dyn Agent>,
    pub assistant: Arc<dyn Agent>,
    pub user_proxy: Arc<dyn Agent>,
}

impl AgentRoster {
    /// Build all four roles on top of `provider`.
    pub fn build(provider: Arc<dyn Provider>, config: &AppConfig, event_bus: Arc<EventBus>) -> Self {
        let model = config.llm.deployment.clone().unwrap_or_default();
        let conversation = &config.conversation;

        let listeners: Vec<Arc<dyn MessageListener>> = vec![
            Arc::new(TranscriptListener),
            Arc::new(EventBusListener::new(event_bus.clone())),
        ];
        let track = |agent: ConversableAgent| -> Arc<dyn Agent> {
            let tracked = listeners
                .iter()
                .cloned()
                .fold(TrackedAgent::new(agent), TrackedAgent::with_listener);
            Arc::new(tracked)
        };

        let planner = track(
            ConversableAgent::new(PLANNER)
                .with_llm(
                    LlmSettings::new(provider.clone(), &model, PLANNER_SYSTEM_MESSAGE)
                        .with_max_tokens(config.llm.max_tokens)
                        .with_stop(config.llm.stop.clone()),
                )
                .with_max_auto_replies(conversation.assistant_max_auto_replies)
                .with_event_bus(event_bus.clone()),
        );

        let planner_user = track(
            ConversableAgent::new(PLANNER_USER)
                .with_max_auto_replies(conversation.planner_proxy_max_auto_replies)
                .with_event_bus(event_bus.clone()),
        );

        let ask_planner = AskPlannerTool::new(planner.clone(), planner_user.clone());
        let ask_planner_definition = ask_planner.to_definition();

        let assistant = track(
            ConversableAgent::new(ASSISTANT)
                .with_llm(
                    LlmSettings::new(provider, &model, ASSISTANT_SYSTEM_MESSAGE)
                        .with_temperature(config.llm.assistant_temperature)
                        .with_seed(config.llm.seed)
                        .with_max_tokens(config.llm.max_tokens)
                        .with_stop(config.llm.stop.clone())
                        .with_tools(vec![ask_planner_definition]),
                )
                .with_max_auto_replies(conversation.assistant_max_auto_replies)
                .with_event_bus(event_bus.clone()),
        );

        let mut functions = ToolRegistry::new();
        functions.register(Box::new(ask_planner));

        let user_proxy = track(
            ConversableAgent::new(USER_PROXY)
                .with_functions(functions)
                .with_termination(TerminationSentinel::new(&conversation.termination_keyword))
                .with_max_auto_replies(conversation.user_proxy_max_auto_replies)
                .with_event_bus(event_bus),
        );

        Self {
            planner,
            planner_user,
            assistant,
            user_proxy,
        }
    }
}
