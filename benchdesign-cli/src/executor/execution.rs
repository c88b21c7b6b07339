//! Method Execution
//!
//! Runs one task per method and collects the outcomes back into registry
//! order.
//!
//! ## Execution Modes
//!
//! - **Sequential**: one task at a time, in registry order.
//!
//! - **Concurrent**: a dedicated rayon pool sized by [`ExecutionConfig::workers`]
//!   runs tasks independently. The pool is built per call and dropped
//!   afterwards, so no process-wide executor is involved.
//!
//! In both modes every task runs under `catch_unwind`: a failure or panic in
//! one method becomes an [`EvaluationFailure`] for that method only.
//!
//! ## Data Flow
//!
//! ```text
//! MethodSpec + Dataset
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ resolve params   │  dataset fields first, then captured scope
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ call primary     │
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ post-process     │  none / single / one callable per channel
//! └────────┬─────────┘
//!          ▼
//!   MethodOutcome (output or failure)
//! ```

use benchdesign_core::{Dataset, MethodSpec, PostSpec};
use benchdesign_logic::{Args, Lookup, Value};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Configuration for method execution
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Run tasks on a worker pool
    pub concurrent: bool,
    /// Pool size; capped at one worker per method
    pub workers: usize,
    /// Draw a progress bar on stderr
    pub show_progress: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            concurrent: false,
            workers: default_workers(),
            show_progress: false,
        }
    }
}

/// Number of available cores, at least one
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Successful output of one method
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutput {
    /// Output of the single implicit channel
    Single(Value),
    /// One output per named channel, in the method's channel order
    Channels(Vec<(String, Value)>),
}

impl MethodOutput {
    /// Output for `channel`
    pub fn channel(&self, channel: &str) -> Option<&Value> {
        match self {
            MethodOutput::Single(v) => Some(v),
            MethodOutput::Channels(values) => {
                values.iter().find(|(c, _)| c == channel).map(|(_, v)| v)
            }
        }
    }
}

/// Stage at which a method failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Resolving the primary callable or a parameter
    Resolve,
    /// Invoking the primary callable
    Call,
    /// Resolving or invoking post-processing
    Post,
    /// The task panicked
    Panic,
}

impl FailureStage {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            FailureStage::Resolve => "resolve",
            FailureStage::Call => "call",
            FailureStage::Post => "post",
            FailureStage::Panic => "panic",
        }
    }
}

/// A recovered per-method failure
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationFailure {
    /// Method label
    pub label: String,
    /// Where it failed
    pub stage: FailureStage,
    /// Underlying cause
    pub message: String,
}

impl fmt::Display for EvaluationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "method '{}' failed ({}): {}",
            self.label,
            self.stage.as_str(),
            self.message
        )
    }
}

/// Outcome of one task
pub type MethodOutcome = Result<MethodOutput, EvaluationFailure>;

/// Runs per-method tasks sequentially or on a worker pool
pub struct ParallelExecutor {
    config: ExecutionConfig,
}

impl ParallelExecutor {
    /// Executor with the given configuration
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    /// Workers actually used for `n_tasks` tasks
    pub fn effective_workers(&self, n_tasks: usize) -> usize {
        if self.config.concurrent {
            self.config.workers.clamp(1, n_tasks.max(1))
        } else {
            1
        }
    }

    /// Execute every method against `dataset`; outcomes follow `methods` order.
    pub fn execute(
        &self,
        methods: &[MethodSpec],
        dataset: &Dataset,
    ) -> Result<Vec<MethodOutcome>, rayon::ThreadPoolBuildError> {
        let pb = self.progress_bar(methods.len());

        let run = |method: &MethodSpec| {
            pb.set_message(method.label.clone());
            let outcome = run_task(method, dataset);
            pb.inc(1);
            outcome
        };

        let outcomes: Vec<MethodOutcome> = if self.config.concurrent && methods.len() > 1 {
            let workers = self.effective_workers(methods.len());
            tracing::debug!(workers, methods = methods.len(), "dispatching concurrently");
            let pool = ThreadPoolBuilder::new().num_threads(workers).build()?;
            pool.install(|| methods.par_iter().map(run).collect())
        } else {
            tracing::debug!(methods = methods.len(), "dispatching sequentially");
            methods.iter().map(run).collect()
        };

        pb.finish_and_clear();
        Ok(outcomes)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}

/// One task: evaluate `method`, containing any failure or panic.
pub fn run_task(method: &MethodSpec, dataset: &Dataset) -> MethodOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| evaluate_method(method, dataset)));

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            Err(EvaluationFailure {
                label: method.label.clone(),
                stage: FailureStage::Panic,
                message,
            })
        }
    };

    if let Err(failure) = &outcome {
        tracing::warn!(
            method = %failure.label,
            stage = failure.stage.as_str(),
            error = %failure.message,
            "method evaluation failed"
        );
    }
    outcome
}

/// Resolve, call and post-process one method.
pub fn evaluate_method(method: &MethodSpec, dataset: &Dataset) -> MethodOutcome {
    let data: &dyn Lookup = dataset;
    let fail = |stage: FailureStage, message: String| EvaluationFailure {
        label: method.label.clone(),
        stage,
        message,
    };

    let primary = method
        .primary
        .resolve_callable(Some(data))
        .map_err(|e| fail(FailureStage::Resolve, e.to_string()))?;

    let mut args = Args::new();
    for (name, expr) in &method.params {
        let value = expr
            .resolve(Some(data))
            .map_err(|e| fail(FailureStage::Resolve, format!("parameter '{name}': {e}")))?;
        args.push(name.clone(), value);
    }

    let result = primary
        .call(&args)
        .map_err(|e| fail(FailureStage::Call, e.to_string()))?;

    match &method.post {
        PostSpec::None => Ok(MethodOutput::Single(result)),
        PostSpec::Single(expr) => {
            let post = expr
                .resolve_callable(Some(data))
                .map_err(|e| fail(FailureStage::Post, e.to_string()))?;
            post.call1(result)
                .map(MethodOutput::Single)
                .map_err(|e| fail(FailureStage::Post, e.to_string()))
        }
        PostSpec::Multi(channels) => {
            let mut outputs = Vec::with_capacity(channels.len());
            for (channel, expr) in channels {
                let post = expr
                    .resolve_callable(Some(data))
                    .map_err(|e| fail(FailureStage::Post, format!("channel '{channel}': {e}")))?;
                let value = post
                    .call1(result.clone())
                    .map_err(|e| fail(FailureStage::Post, format!("channel '{channel}': {e}")))?;
                outputs.push((channel.clone(), value));
            }
            Ok(MethodOutput::Channels(outputs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchdesign_logic::{Callable, DeferredExpr, builtins};

    fn dataset() -> Dataset {
        Dataset::from_fields([("p", Value::numbers([0.01, 0.2, 0.05]))])
    }

    fn method(label: &str, primary: &str) -> MethodSpec {
        let scope = builtins::scope();
        MethodSpec::new(label, DeferredExpr::symbol(primary).capture(&scope))
            .param("x", DeferredExpr::symbol("p"))
    }

    fn exploding() -> MethodSpec {
        let boom = Callable::new("boom", |_: &Args| panic!("kaboom"));
        MethodSpec::new("boom", DeferredExpr::callable(boom)).param("x", DeferredExpr::symbol("p"))
    }

    #[test]
    fn test_identity_passes_through() {
        let out = evaluate_method(&method("m1", "identity"), &dataset()).unwrap();
        assert_eq!(out, MethodOutput::Single(Value::numbers([0.01, 0.2, 0.05])));
    }

    #[test]
    fn test_unknown_parameter_is_resolve_failure() {
        let m = method("m1", "identity").param("y", DeferredExpr::symbol("nope"));
        let err = evaluate_method(&m, &dataset()).unwrap_err();
        assert_eq!(err.stage, FailureStage::Resolve);
        assert!(err.message.contains("parameter 'y'"));
    }

    #[test]
    fn test_not_callable_primary() {
        let m = MethodSpec::new("m", DeferredExpr::symbol("p"));
        let err = evaluate_method(&m, &dataset()).unwrap_err();
        assert_eq!(err.stage, FailureStage::Resolve);
    }

    #[test]
    fn test_multi_post_uses_same_primary_result() {
        let scope = builtins::scope();
        let m = method("m", "identity").post(PostSpec::multi([
            ("neg", DeferredExpr::symbol("neg").capture(&scope)),
            ("same", DeferredExpr::symbol("identity").capture(&scope)),
        ]));
        let out = evaluate_method(&m, &dataset()).unwrap();
        assert_eq!(
            out.channel("neg"),
            Some(&Value::numbers([-0.01, -0.2, -0.05]))
        );
        assert_eq!(out.channel("same"), Some(&Value::numbers([0.01, 0.2, 0.05])));
    }

    #[test]
    fn test_panic_is_contained() {
        let outcome = run_task(&exploding(), &dataset());
        let err = outcome.unwrap_err();
        assert_eq!(err.stage, FailureStage::Panic);
        assert_eq!(err.message, "kaboom");
    }

    #[test]
    fn test_concurrent_matches_sequential() {
        let methods = vec![
            method("a", "identity"),
            exploding(),
            method("c", "rank"),
            method("d", "neg"),
        ];
        let seq = ParallelExecutor::new(ExecutionConfig::default())
            .execute(&methods, &dataset())
            .unwrap();
        let par = ParallelExecutor::new(ExecutionConfig {
            concurrent: true,
            workers: 3,
            show_progress: false,
        })
        .execute(&methods, &dataset())
        .unwrap();
        assert_eq!(seq, par);
        assert!(par[1].is_err());
        assert!(par[0].is_ok() && par[2].is_ok() && par[3].is_ok());
    }

    #[test]
    fn test_effective_workers() {
        let exec = ParallelExecutor::new(ExecutionConfig {
            concurrent: true,
            workers: 16,
            show_progress: false,
        });
        assert_eq!(exec.effective_workers(3), 3);
        assert_eq!(exec.effective_workers(0), 1);
        let seq = ParallelExecutor::new(ExecutionConfig::default());
        assert_eq!(seq.effective_workers(10), 1);
    }
}
