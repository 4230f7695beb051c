//! Feeling interpretation loop
//!
//! Interpret -> Encourage -> Judge, then either Finalize (scores high enough,
//! or out of iterations) or Reflect and go around again. Reflections
//! accumulate and are fed back into the next interpretation.

use crate::agents::{notify, parse_json, AgentError, AgentResult, Observer};
use crate::config::AgentsConfig;
use crate::llm::TextCompletion;
use serde::Deserialize;

const INTERPRET_SYSTEM: &str = "You are a helpful assistant that interprets how a person feels.";
const ENCOURAGE_SYSTEM: &str = "You are a helpful assistant that gives encouragement.";
const JUDGE_SYSTEM: &str = "You are a strict judge of encouragement messages.";
const REFLECT_SYSTEM: &str = "You help improve encouragement messages based on their evaluation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeelerState {
    Interpret,
    Encourage,
    Judge,
    Reflect,
    Finalize,
    Done,
}

impl FeelerState {
    pub fn node_name(&self) -> &'static str {
        match self {
            Self::Interpret => "INTERPRET",
            Self::Encourage => "ENCOURAGE",
            Self::Judge => "JUDGE",
            Self::Reflect => "REFLECT",
            Self::Finalize => "FINALIZE",
            Self::Done => "DONE",
        }
    }
}

/// Loop limits for the feeler
#[derive(Debug, Clone, Copy)]
pub struct FeelerLimits {
    /// Both scores must be strictly above this to finish early
    pub score_threshold: f64,

    /// Finalize once the iteration count exceeds this
    pub max_iterations: u32,
}

impl From<&AgentsConfig> for FeelerLimits {
    fn from(config: &AgentsConfig) -> Self {
        Self {
            score_threshold: config.score_threshold,
            max_iterations: config.max_feeler_iterations,
        }
    }
}

impl Default for FeelerLimits {
    fn default() -> Self {
        Self::from(&AgentsConfig::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FeelerContext {
    pub user_input: String,
    pub interpretation: String,

    /// Latest encouragement; replaced on every iteration
    pub encouragement: String,

    /// Set only by the finalize node
    pub final_output: Option<String>,

    pub good_score: f64,
    pub suitable_score: f64,
    pub iterations: u32,
    pub improvements: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JudgeScores {
    good_score: f64,
    suitable_score: f64,
}

/// The transition table; the Judge edge is the only guarded one
pub fn transition(state: FeelerState, ctx: &FeelerContext, limits: &FeelerLimits) -> FeelerState {
    match state {
        FeelerState::Interpret => FeelerState::Encourage,
        FeelerState::Encourage => FeelerState::Judge,
        FeelerState::Judge => {
            let good_enough = ctx.good_score > limits.score_threshold
                && ctx.suitable_score > limits.score_threshold;
            if good_enough || ctx.iterations > limits.max_iterations {
                FeelerState::Finalize
            } else {
                FeelerState::Reflect
            }
        }
        FeelerState::Reflect => FeelerState::Interpret,
        FeelerState::Finalize | FeelerState::Done => FeelerState::Done,
    }
}

pub struct FeelerGraph<'a> {
    llm: &'a dyn TextCompletion,
    limits: FeelerLimits,
}

impl<'a> FeelerGraph<'a> {
    pub fn new(llm: &'a dyn TextCompletion, limits: FeelerLimits) -> Self {
        Self { llm, limits }
    }

    pub async fn run(
        &self,
        user_input: &str,
        mut observer: Option<&mut dyn Observer>,
    ) -> AgentResult<FeelerContext> {
        let mut ctx = FeelerContext {
            user_input: user_input.to_string(),
            ..FeelerContext::default()
        };
        let mut state = FeelerState::Interpret;

        while state != FeelerState::Done {
            self.step(state, &mut ctx, &mut observer).await?;
            state = transition(state, &ctx, &self.limits);
        }

        tracing::info!(
            "Feeler finished after {} iterations (good {:.2}, suitable {:.2})",
            ctx.iterations,
            ctx.good_score,
            ctx.suitable_score
        );
        Ok(ctx)
    }

    async fn step(
        &self,
        state: FeelerState,
        ctx: &mut FeelerContext,
        observer: &mut Option<&mut dyn Observer>,
    ) -> AgentResult<()> {
        let node = state.node_name();
        match state {
            FeelerState::Interpret => {
                notify(observer, node, "Interpreting...");
                let improvements = if ctx.improvements.is_empty() {
                    "none".to_string()
                } else {
                    ctx.improvements.join("\n- ")
                };
                let prompt = format!(
                    "User input: {}\n\n\
                     Interpret the input and return a short summary: what might it mean, \
                     and what kind of help might the person need?\n\n\
                     Improvements suggested by earlier reflection:\n- {}",
                    ctx.user_input, improvements
                );
                ctx.interpretation = self.llm.complete(node, INTERPRET_SYSTEM, &prompt).await?;
                ctx.iterations += 1;
            }
            FeelerState::Encourage => {
                notify(observer, node, "Writing encouragement...");
                let prompt = format!(
                    "Interpretation: {}\n\n\
                     Give the person some encouragement based on this interpretation. \
                     Keep it short and avoid clichés; something abstract or absurdly funny works.",
                    ctx.interpretation
                );
                ctx.encouragement = self.llm.complete(node, ENCOURAGE_SYSTEM, &prompt).await?;
            }
            FeelerState::Judge => {
                notify(observer, node, "Judging...");
                let prompt = format!(
                    "Encouragement: {}\n\n\
                     Rate from 0 to 1 how good it is and how suitable it is.\n\
                     Return ONLY valid JSON, with no other text:\n\
                     {{\"good_score\": float, \"suitable_score\": float}}",
                    ctx.encouragement
                );
                let response = self.llm.complete(node, JUDGE_SYSTEM, &prompt).await?;
                let scores: JudgeScores =
                    parse_json(&response).map_err(|e| AgentError::Parse {
                        node: "JUDGE",
                        message: e.to_string(),
                    })?;
                ctx.good_score = scores.good_score;
                ctx.suitable_score = scores.suitable_score;
            }
            FeelerState::Reflect => {
                notify(observer, node, "Reflecting...");
                let prompt = format!(
                    "Evaluation of the last encouragement: good score {}, suitable score {}.\n\
                     Write 1-2 improvements that would raise these scores.",
                    ctx.good_score, ctx.suitable_score
                );
                let reflection = self.llm.complete(node, REFLECT_SYSTEM, &prompt).await?;
                ctx.improvements.push(reflection);
            }
            FeelerState::Finalize => {
                notify(observer, node, "Done.");
                ctx.final_output = Some(ctx.encouragement.clone());
            }
            FeelerState::Done => {}
        }
        Ok(())
    }
}
