//! Step definition registry
//!
//! Definitions are (pattern, handler) pairs. Matching a step text yields the
//! set of every definition whose pattern matches; a step is undefined when the
//! set is empty and ambiguous when it holds more than one definition.
//! Handlers receive the pattern's captures and, when the step carries one, its
//! data table or doc string.
//! [`StepRegistry::evaluate`] runs the matching handler and reports the result
//! in the protocol's own terms, so a runner can feed it straight to the adapter.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use scenecast_core::RuntimeError;
use tracing::debug;

use crate::config::AdapterConfig;
use crate::error::{AdapterError, AdapterResult};
use crate::protocol::{PickleArgument, PickleStep, RawException, Status, TestResult};

/// What a step handler reports when it returns normally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepReturn {
    Done,
    /// The step is explicitly marked as pending
    Pending,
}

/// Data table or doc string passed to a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepArgument {
    /// Cell values, row by row
    Table(Vec<Vec<String>>),
    DocString(String),
}

impl From<&PickleArgument> for StepArgument {
    fn from(argument: &PickleArgument) -> Self {
        match argument {
            PickleArgument::Table(table) => Self::Table(
                table
                    .rows
                    .iter()
                    .map(|row| row.cells.iter().map(|cell| cell.value.clone()).collect())
                    .collect(),
            ),
            PickleArgument::DocString(doc) => Self::DocString(doc.content.clone()),
        }
    }
}

pub type StepFuture = BoxFuture<'static, Result<StepReturn, RuntimeError>>;

type Handler = Arc<dyn Fn(Vec<String>, Option<StepArgument>) -> StepFuture + Send + Sync>;

pub struct StepDefinition {
    pattern: Regex,
    timeout: Option<Duration>,
    handler: Handler,
}

impl StepDefinition {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Capture groups of `text`, in order; unmatched optional groups are empty
    fn arguments(&self, text: &str) -> Vec<String> {
        self.pattern
            .captures(text)
            .map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDefinition")
            .field("pattern", &self.pattern.as_str())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Outcome of matching a step text against the registry
#[derive(Debug)]
pub enum StepMatch<'a> {
    Undefined,
    Unique {
        definition: &'a StepDefinition,
        arguments: Vec<String>,
    },
    Ambiguous(RuntimeError),
}

pub struct StepRegistry {
    definitions: Vec<StepDefinition>,
    default_timeout: Duration,
}

impl StepRegistry {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            definitions: Vec::new(),
            default_timeout: config.step_timeout(),
        }
    }

    /// Register a step definition using the default timeout
    pub fn define<F, Fut>(&mut self, pattern: &str, handler: F) -> AdapterResult<&mut Self>
    where
        F: Fn(Vec<String>, Option<StepArgument>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepReturn, RuntimeError>> + Send + 'static,
    {
        self.add(pattern, None, handler)
    }

    /// Register a step definition with its own timeout
    pub fn define_with_timeout<F, Fut>(
        &mut self,
        pattern: &str,
        timeout: Duration,
        handler: F,
    ) -> AdapterResult<&mut Self>
    where
        F: Fn(Vec<String>, Option<StepArgument>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepReturn, RuntimeError>> + Send + 'static,
    {
        self.add(pattern, Some(timeout), handler)
    }

    fn add<F, Fut>(&mut self, pattern: &str, timeout: Option<Duration>, handler: F) -> AdapterResult<&mut Self>
    where
        F: Fn(Vec<String>, Option<StepArgument>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<StepReturn, RuntimeError>> + Send + 'static,
    {
        let compiled = Regex::new(pattern).map_err(|source| AdapterError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        self.definitions.push(StepDefinition {
            pattern: compiled,
            timeout,
            handler: Arc::new(move |args, argument| handler(args, argument).boxed()),
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Every definition matching `text`, in registration order
    pub fn matching(&self, text: &str) -> Vec<&StepDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.pattern.is_match(text))
            .collect()
    }

    pub fn resolve(&self, text: &str) -> StepMatch<'_> {
        match self.matching(text).as_slice() {
            [] => StepMatch::Undefined,
            [definition] => StepMatch::Unique {
                definition: *definition,
                arguments: definition.arguments(text),
            },
            many => {
                let patterns: Vec<String> = many.iter().map(|d| format!("  /{}/", d.pattern())).collect();
                StepMatch::Ambiguous(RuntimeError::ambiguous(format!(
                    "Multiple step definitions match:\n{}",
                    patterns.join("\n")
                )))
            }
        }
    }

    /// Run the step matching `text` and report how it went.
    ///
    /// Errors and panics raised by the handler are captured in the result.
    pub async fn evaluate(&self, text: &str) -> TestResult {
        self.evaluate_with(text, None).await
    }

    /// Run a compiled step, handing its first argument to the handler
    pub async fn evaluate_step(&self, step: &PickleStep) -> TestResult {
        let argument = step.arguments.first().map(StepArgument::from);
        self.evaluate_with(&step.text, argument).await
    }

    /// Run the step matching `text` with an optional data table or doc string
    pub async fn evaluate_with(&self, text: &str, argument: Option<StepArgument>) -> TestResult {
        let (definition, arguments) = match self.resolve(text) {
            StepMatch::Undefined => return TestResult::new(Status::Undefined),
            StepMatch::Ambiguous(error) => {
                return TestResult::new(Status::Ambiguous).with_exception(RawException::from(&error))
            }
            StepMatch::Unique { definition, arguments } => (definition, arguments),
        };

        let timeout = definition.timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();
        debug!(step = text, pattern = definition.pattern(), "evaluating step");

        // The handler may panic before it hands back its future
        let invocation = match panic::catch_unwind(AssertUnwindSafe(|| (definition.handler)(arguments, argument))) {
            Ok(future) => AssertUnwindSafe(future).catch_unwind(),
            Err(_panic) => return panicked(text).with_duration(elapsed_millis(start)),
        };
        let result = match tokio::time::timeout(timeout, invocation).await {
            Ok(Ok(Ok(StepReturn::Done))) => TestResult::new(Status::Passed),
            Ok(Ok(Ok(StepReturn::Pending))) => TestResult::new(Status::Pending),
            Ok(Ok(Err(error))) => TestResult::new(Status::Failed).with_exception(RawException::from(&error)),
            Ok(Err(_panic)) => panicked(text),
            Err(_elapsed) => {
                let error = RuntimeError::generic(format!(
                    "function timed out, ensure the promise resolves within {} milliseconds",
                    timeout.as_millis()
                ));
                TestResult::new(Status::Failed).with_exception(RawException::from(&error))
            }
        };

        result.with_duration(elapsed_millis(start))
    }
}

fn panicked(text: &str) -> TestResult {
    let error = RuntimeError::generic(format!("Step \"{}\" panicked", text));
    TestResult::new(Status::Failed).with_exception(RawException::from(&error))
}

fn elapsed_millis(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
