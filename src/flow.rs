//! Staged pipeline engine
//!
//! A [`Flow`] is a set of named steps plus an edge table. Each step is a
//! [`Node`] whose three phases run in strict order:
//!
//! 1. `prep` reads what it needs from the shared context,
//! 2. `exec` does the work (the only phase allowed to `.await`),
//! 3. `post` writes results back and returns an action name.
//!
//! The action selects the next step through the edges declared when the flow
//! was built. [`FINISHED`] or [`DONE`], or an action with no edge, ends the
//! run. Errors from any phase abort the run immediately.
//!
//! The shared context is a plain `&mut S`, so one context belongs to exactly
//! one run; concurrent calls each build their own.

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;

pub const FINISHED: &str = "finished";
pub const DONE: &str = "done";

#[async_trait]
pub trait Node<S: Send>: Send + Sync {
    type Prep: Send + Sync;
    type Exec: Send;

    fn prep(&self, shared: &mut S) -> Result<Self::Prep>;

    async fn exec(&self, prep: &Self::Prep) -> Result<Self::Exec>;

    fn post(&self, shared: &mut S, prep: Self::Prep, exec: Self::Exec) -> Result<String>;
}

/// Object-safe view of a [`Node`] so heterogeneous nodes share one table.
#[async_trait]
trait Step<S>: Send + Sync {
    async fn run(&self, shared: &mut S) -> Result<String>;
}

#[async_trait]
impl<S, N> Step<S> for N
where
    S: Send,
    N: Node<S>,
{
    async fn run(&self, shared: &mut S) -> Result<String> {
        let prep = self.prep(shared)?;
        let exec = self.exec(&prep).await?;
        self.post(shared, prep, exec)
    }
}

struct FlowStep<S> {
    name: String,
    node: Box<dyn Step<S>>,
}

/// What a completed run went through.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRun {
    /// Step names in execution order.
    pub visited: Vec<String>,
    /// Action returned by the last step's `post`.
    pub last_action: String,
}

pub struct Flow<S> {
    steps: Vec<FlowStep<S>>,
    edges: HashMap<(String, String), String>,
}

impl<S: Send> Flow<S> {
    /// Create a flow whose entry point is `node`.
    pub fn start(name: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        Self {
            steps: vec![FlowStep {
                name: name.into(),
                node: Box::new(node),
            }],
            edges: HashMap::new(),
        }
    }

    /// Register a step without connecting it.
    pub fn add(mut self, name: impl Into<String>, node: impl Node<S> + 'static) -> Self {
        self.steps.push(FlowStep {
            name: name.into(),
            node: Box::new(node),
        });
        self
    }

    /// Declare `from --action--> to`.
    pub fn edge(
        mut self,
        from: impl Into<String>,
        action: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.edges.insert((from.into(), action.into()), to.into());
        self
    }

    /// Register `node` and connect the most recently added step to it on
    /// `action`.
    pub fn then(
        self,
        action: impl Into<String>,
        name: impl Into<String>,
        node: impl Node<S> + 'static,
    ) -> Self {
        let name = name.into();
        let previous = self
            .steps
            .last()
            .map(|step| step.name.clone())
            .unwrap_or_default();
        self.add(name.clone(), node).edge(previous, action, name)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == name)
    }

    /// Run from the entry step until a terminal action.
    pub async fn run(&self, shared: &mut S) -> Result<FlowRun> {
        let mut current = 0;
        let mut visited = Vec::new();

        loop {
            let step = &self.steps[current];
            tracing::debug!("Running flow step: {}", step.name);

            let action = step.node.run(shared).await?;
            visited.push(step.name.clone());

            if action == FINISHED || action == DONE {
                return Ok(FlowRun {
                    visited,
                    last_action: action,
                });
            }

            let Some(next) = self.edges.get(&(step.name.clone(), action.clone())) else {
                tracing::debug!(
                    "No successor for action '{}' after step '{}', ending flow",
                    action,
                    step.name
                );
                return Ok(FlowRun {
                    visited,
                    last_action: action,
                });
            };

            current = self.index_of(next).ok_or_else(|| {
                Error::Invariant(format!(
                    "flow edge '{}' --{}--> '{}' targets an unregistered step",
                    step.name, action, next
                ))
            })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct Context {
        available_parameters: BTreeMap<String, String>,
        calls: Vec<String>,
        counter: u32,
    }

    struct Recorder {
        name: &'static str,
        action: &'static str,
    }

    #[async_trait]
    impl Node<Context> for Recorder {
        type Prep = ();
        type Exec = ();

        fn prep(&self, shared: &mut Context) -> Result<()> {
            shared.calls.push(format!("{}.prep", self.name));
            Ok(())
        }

        async fn exec(&self, _prep: &()) -> Result<()> {
            Ok(())
        }

        fn post(&self, shared: &mut Context, _prep: (), _exec: ()) -> Result<String> {
            shared.calls.push(format!("{}.exec+post", self.name));
            Ok(self.action.to_string())
        }
    }

    struct Doubler;

    #[async_trait]
    impl Node<Context> for Doubler {
        type Prep = String;
        type Exec = String;

        fn prep(&self, shared: &mut Context) -> Result<String> {
            shared
                .available_parameters
                .get("word")
                .cloned()
                .ok_or_else(|| Error::Invariant("missing word".to_string()))
        }

        async fn exec(&self, prep: &String) -> Result<String> {
            Ok(prep.repeat(2))
        }

        fn post(&self, shared: &mut Context, prep: String, exec: String) -> Result<String> {
            shared.calls.push(format!("{}->{}", prep, exec));
            Ok("wrap-up".to_string())
        }
    }

    struct Looper;

    #[async_trait]
    impl Node<Context> for Looper {
        type Prep = u32;
        type Exec = u32;

        fn prep(&self, shared: &mut Context) -> Result<u32> {
            Ok(shared.counter)
        }

        async fn exec(&self, prep: &u32) -> Result<u32> {
            Ok(prep + 1)
        }

        fn post(&self, shared: &mut Context, _prep: u32, exec: u32) -> Result<String> {
            shared.counter = exec;
            Ok(if exec < 3 { "again" } else { DONE }.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl Node<Context> for Failing {
        type Prep = ();
        type Exec = ();

        fn prep(&self, _shared: &mut Context) -> Result<()> {
            Ok(())
        }

        async fn exec(&self, _prep: &()) -> Result<()> {
            Err(Error::Transport("boom".to_string()))
        }

        fn post(&self, shared: &mut Context, _prep: (), _exec: ()) -> Result<String> {
            shared.calls.push("failing.post".to_string());
            Ok(FINISHED.to_string())
        }
    }

    #[tokio::test]
    async fn test_three_step_flow_runs_in_order() {
        let flow = Flow::start("prepare", Recorder { name: "prepare", action: "call" })
            .then("call", "call", Recorder { name: "call", action: "wrap-up" })
            .then("wrap-up", "wrap-up", Recorder { name: "wrap-up", action: FINISHED });

        let mut context = Context::default();
        context
            .available_parameters
            .insert("model".to_string(), "gemini-2.5-flash".to_string());

        let run = flow.run(&mut context).await.unwrap();

        assert_eq!(run.visited, vec!["prepare", "call", "wrap-up"]);
        assert_eq!(run.last_action, FINISHED);
        assert_eq!(
            context.calls,
            vec![
                "prepare.prep",
                "prepare.exec+post",
                "call.prep",
                "call.exec+post",
                "wrap-up.prep",
                "wrap-up.exec+post",
            ]
        );
    }

    #[tokio::test]
    async fn test_prep_result_reaches_exec_and_post() {
        let flow = Flow::start("double", Doubler);
        let mut context = Context::default();
        context
            .available_parameters
            .insert("word".to_string(), "ab".to_string());

        let run = flow.run(&mut context).await.unwrap();

        assert_eq!(context.calls, vec!["ab->abab"]);
        assert_eq!(run.last_action, "wrap-up");
    }

    #[tokio::test]
    async fn test_unknown_action_halts_without_error() {
        let flow = Flow::start("prepare", Recorder { name: "prepare", action: "detour" })
            .then("call", "call", Recorder { name: "call", action: FINISHED });

        let mut context = Context::default();
        let run = flow.run(&mut context).await.unwrap();

        assert_eq!(run.visited, vec!["prepare"]);
        assert_eq!(run.last_action, "detour");
    }

    #[tokio::test]
    async fn test_sentinel_wins_over_declared_edge() {
        let flow = Flow::start("only", Recorder { name: "only", action: FINISHED })
            .then(FINISHED, "never", Recorder { name: "never", action: FINISHED });

        let mut context = Context::default();
        let run = flow.run(&mut context).await.unwrap();

        assert_eq!(run.visited, vec!["only"]);
    }

    #[tokio::test]
    async fn test_self_edge_loops_until_done() {
        let flow = Flow::start("loop", Looper).edge("loop", "again", "loop");

        let mut context = Context::default();
        let run = flow.run(&mut context).await.unwrap();

        assert_eq!(context.counter, 3);
        assert_eq!(run.visited.len(), 3);
        assert_eq!(run.last_action, DONE);
    }

    #[tokio::test]
    async fn test_error_aborts_before_post() {
        let flow = Flow::start("fail", Failing)
            .then(FINISHED, "after", Recorder { name: "after", action: FINISHED });

        let mut context = Context::default();
        let err = flow.run(&mut context).await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert!(context.calls.is_empty());
    }

    #[tokio::test]
    async fn test_edge_to_unregistered_step_is_invariant_error() {
        let flow = Flow::start("prepare", Recorder { name: "prepare", action: "call" })
            .edge("prepare", "call", "ghost");

        let mut context = Context::default();
        let err = flow.run(&mut context).await.unwrap_err();

        assert!(matches!(err, Error::Invariant(_)));
    }
}
