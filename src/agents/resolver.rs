//! Self-healing code fixer
//!
//! Code -> Test, looping back to Code until the test command passes or the
//! attempt budget runs out. The coder rewrites the sandbox file in place; the
//! tester runs the configured command and keeps its output as the error log
//! for the next attempt.

use crate::agents::{notify, strip_code_fence, AgentError, AgentResult, Observer};
use crate::llm::TextCompletion;
use std::path::PathBuf;
use tokio::process::Command;

const CODER_SYSTEM: &str = "You are an expert developer. Return ONLY the corrected code. No explanations.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Code,
    Test,
    Done,
}

impl ResolverState {
    pub fn node_name(&self) -> &'static str {
        match self {
            Self::Code => "CODER",
            Self::Test => "TESTER",
            Self::Done => "DONE",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverContext {
    pub code: String,
    pub error_log: String,
    pub iterations: u32,

    /// Outcome of the latest test run
    pub passed: bool,
}

/// The transition table; the Test edge is the only guarded one
pub fn transition(state: ResolverState, ctx: &ResolverContext, max_iterations: u32) -> ResolverState {
    match state {
        ResolverState::Code => ResolverState::Test,
        ResolverState::Test if ctx.passed => ResolverState::Done,
        ResolverState::Test if ctx.iterations >= max_iterations => {
            tracing::warn!("Max iterations reached!");
            ResolverState::Done
        }
        ResolverState::Test => ResolverState::Code,
        ResolverState::Done => ResolverState::Done,
    }
}

pub struct ResolverGraph<'a> {
    llm: &'a dyn TextCompletion,
    sandbox: PathBuf,
    test_command: Vec<String>,
    max_iterations: u32,
}

impl<'a> ResolverGraph<'a> {
    /// Creates a resolver for the code in `sandbox`
    ///
    /// # Arguments
    ///
    /// * `llm` - Completion capability for the coder node
    /// * `sandbox` - File holding the code; rewritten on every attempt
    /// * `test_command` - Command line to run, split on whitespace (no shell)
    /// * `max_iterations` - Coding attempts before giving up
    pub fn new(
        llm: &'a dyn TextCompletion,
        sandbox: impl Into<PathBuf>,
        test_command: &str,
        max_iterations: u32,
    ) -> AgentResult<Self> {
        let test_command: Vec<String> = test_command.split_whitespace().map(String::from).collect();
        if test_command.is_empty() {
            return Err(AgentError::Command("test command is empty".to_string()));
        }
        Ok(Self {
            llm,
            sandbox: sandbox.into(),
            test_command,
            max_iterations: max_iterations.max(1),
        })
    }

    /// Runs the graph starting from the current sandbox contents
    pub async fn run(&self, mut observer: Option<&mut dyn Observer>) -> AgentResult<ResolverContext> {
        let mut ctx = ResolverContext {
            code: tokio::fs::read_to_string(&self.sandbox).await?,
            ..ResolverContext::default()
        };
        let mut state = ResolverState::Code;

        while state != ResolverState::Done {
            self.step(state, &mut ctx, &mut observer).await?;
            state = transition(state, &ctx, self.max_iterations);
        }

        if ctx.passed {
            tracing::info!("Tests passed after {} attempts", ctx.iterations);
        } else {
            tracing::warn!("Tests still failing after {} attempts", ctx.iterations);
        }
        Ok(ctx)
    }

    async fn step(
        &self,
        state: ResolverState,
        ctx: &mut ResolverContext,
        observer: &mut Option<&mut dyn Observer>,
    ) -> AgentResult<()> {
        let node = state.node_name();
        match state {
            ResolverState::Code => {
                let status = format!("Coding (iteration {})...", ctx.iterations + 1);
                notify(observer, node, &status);
                let prompt = format!(
                    "Fix the bug in the following code based on the error log.\n\n\
                     CODE:\n{}\n\nERROR:\n{}",
                    ctx.code, ctx.error_log
                );
                let response = self.llm.complete(node, CODER_SYSTEM, &prompt).await?;
                ctx.code = strip_code_fence(&response).to_string();
                tokio::fs::write(&self.sandbox, &ctx.code).await?;
                ctx.iterations += 1;
            }
            ResolverState::Test => {
                notify(observer, node, "Testing...");
                let output = Command::new(&self.test_command[0])
                    .args(&self.test_command[1..])
                    .output()
                    .await
                    .map_err(|e| AgentError::Command(format!("{}: {}", self.test_command[0], e)))?;
                ctx.passed = output.status.success();
                ctx.error_log = format!(
                    "{}{}",
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr)
                );
                tracing::info!("Test run {}", if ctx.passed { "PASSED" } else { "FAILED" });
            }
            ResolverState::Done => {}
        }
        Ok(())
    }
}
