//! Workflow Engine
//!
//! Generate -> Execute -> (retry | explain | stop) with a bounded retry
//! budget. Security violations stop the run regardless of remaining budget.

use crate::config::AppConfig;
use crate::error::{AgentError, Result};
use crate::execution::QueryExecutor;
use crate::execution_loop::error_classifier::{ErrorClassifier, Stage, WorkflowError};
use crate::execution_loop::state::{
    QueryRequest, RunFailure, RunOutcome, RunSuccess, WorkflowState, WorkflowStep,
};
use crate::generator::QueryGenerator;
use crate::llm::{ChatModel, ModelSelector, ProviderRegistry};
use crate::schema_inspector;
use crate::security::validate_sql_safety;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const NO_DATA_MESSAGE: &str = "No data found for your query.";
pub const EXPLANATION_UNAVAILABLE_MESSAGE: &str =
    "The query ran successfully, but an explanation could not be generated.";

pub struct WorkflowEngine {
    generator: QueryGenerator,
    executor: QueryExecutor,
    classifier: ErrorClassifier,
    max_retries: u32,
}

impl WorkflowEngine {
    pub fn new(generator: QueryGenerator, executor: QueryExecutor, max_retries: u32) -> Self {
        Self {
            generator,
            executor,
            classifier: ErrorClassifier::new(),
            max_retries,
        }
    }

    /// Wire generator, executor and retry budget from configuration
    pub fn from_config(config: Arc<AppConfig>, registry: ProviderRegistry) -> Result<Self> {
        let preview_rows = config.settings.explanation_preview_rows;
        let max_retries = config.settings.max_retries;
        let executor = QueryExecutor::new(config.query_timeout());
        let selector = ModelSelector::from_config(config, registry)?;
        Ok(Self::new(
            QueryGenerator::new(selector, preview_rows),
            executor,
            max_retries,
        ))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Answer one question end to end.
    ///
    /// Every workflow failure is reported through `RunOutcome::Failure`; `Err`
    /// is reserved for internal faults such as a panicked blocking task.
    pub async fn run(&self, request: QueryRequest) -> Result<RunOutcome> {
        let span = info_span!("workflow_run", run_id = %Uuid::new_v4());
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: QueryRequest) -> Result<RunOutcome> {
        info!("Question: {}", request.question);

        let db_path = request.db_path.clone();
        let schema = tokio::task::spawn_blocking(move || schema_inspector::describe(&db_path))
            .await
            .map_err(|e| AgentError::Internal(format!("Schema task failed: {}", e)))?;
        let schema = match schema {
            Ok(schema) => schema.to_prompt_text(),
            Err(e) => {
                warn!("Schema unavailable, not starting workflow: {}", e);
                return Ok(self.failure(self.classifier.classify(&e, Stage::Schema), None, 0));
            }
        };

        let model = match self
            .generator
            .select_model(request.provider.as_deref(), request.model_name.as_deref())
        {
            Ok(model) => model,
            Err(e) => {
                warn!("Model backend unavailable: {}", e);
                return Ok(self.failure(self.classifier.classify(&e, Stage::Setup), None, 0));
            }
        };

        let mut state = WorkflowState::new(request, schema);
        let mut step = WorkflowStep::Generate;
        while !step.is_terminal() {
            debug!("Step {:?} (attempt {})", step, state.retry_count);
            step = match step {
                WorkflowStep::Generate => {
                    self.generate_step(&mut state, model.as_ref()).await;
                    WorkflowStep::Execute
                }
                WorkflowStep::Execute => {
                    self.execute_step(&mut state).await?;
                    self.check_status(&state)
                }
                WorkflowStep::Explain => {
                    self.explain_step(&mut state, model.as_ref()).await;
                    WorkflowStep::Success
                }
                WorkflowStep::Success | WorkflowStep::Failure => step,
            };
        }

        Ok(self.finish(state, step))
    }

    async fn generate_step(&self, state: &mut WorkflowState, model: &dyn ChatModel) {
        let hint = state.error.take().map(|e| e.to_string());
        state.retry_count += 1;
        info!(
            "Generating SQL (attempt {} of {})",
            state.retry_count,
            self.max_retries + 1
        );

        match self
            .generator
            .generate_query(
                model,
                &state.question,
                &state.schema,
                &state.chat_history,
                hint.as_deref(),
            )
            .await
        {
            Ok(sql) => state.sql = sql,
            Err(e) => {
                warn!("Generation failed: {}", e);
                state.sql.clear();
                state.error = Some(self.classifier.classify(&e, Stage::Generate));
            }
        }
    }

    async fn execute_step(&self, state: &mut WorkflowState) -> Result<()> {
        // A failed generation leaves nothing new to run; the status check decides
        if state.error.is_some() {
            state.result = None;
            return Ok(());
        }

        let sql = match validate_sql_safety(&state.sql) {
            Ok(sql) => sql.to_string(),
            Err(e) => {
                state.error = Some(self.classifier.classify(&e, Stage::Execute));
                state.result = None;
                return Ok(());
            }
        };

        let executor = self.executor.clone();
        let db_path = state.db_path.clone();
        let outcome = tokio::task::spawn_blocking(move || executor.execute(&sql, &db_path))
            .await
            .map_err(|e| AgentError::Internal(format!("Execution task failed: {}", e)))?;

        match outcome {
            Ok(result) => {
                state.result = Some(result);
                state.error = None;
            }
            Err(e) => {
                warn!("Execution failed: {}", e);
                state.error = Some(self.classifier.classify(&e, Stage::Execute));
                state.result = None;
            }
        }
        Ok(())
    }

    /// Route after execution. `retry_count` counts generations, so the run
    /// may generate `max_retries + 1` times before giving up.
    fn check_status(&self, state: &WorkflowState) -> WorkflowStep {
        match &state.error {
            None => WorkflowStep::Explain,
            Some(error) if error.is_security_violation() => {
                warn!("Security violation, stopping: {}", error);
                WorkflowStep::Failure
            }
            Some(_) if state.retry_count <= self.max_retries => WorkflowStep::Generate,
            Some(error) => {
                warn!("Retry budget spent after {} attempts: {}", state.retry_count, error);
                WorkflowStep::Failure
            }
        }
    }

    async fn explain_step(&self, state: &mut WorkflowState, model: &dyn ChatModel) {
        let Some(result) = state.result.as_mut() else {
            return;
        };

        if result.is_empty() {
            if result.message.is_none() {
                result.message = Some(NO_DATA_MESSAGE.to_string());
            }
            return;
        }

        match self
            .generator
            .generate_explanation(model, &state.question, &state.sql, result)
            .await
        {
            Ok(explanation) if !explanation.is_empty() => result.message = Some(explanation),
            Ok(_) => result.message = Some(EXPLANATION_UNAVAILABLE_MESSAGE.to_string()),
            Err(e) => {
                warn!("Explanation failed, returning rows without it: {}", e);
                result.message = Some(EXPLANATION_UNAVAILABLE_MESSAGE.to_string());
            }
        }
    }

    fn finish(&self, state: WorkflowState, step: WorkflowStep) -> RunOutcome {
        let attempts = state.retry_count;
        let sql = (!state.sql.is_empty()).then(|| state.sql.clone());

        match (step, state.result, state.error) {
            (WorkflowStep::Success, Some(result), None) => {
                info!("Run succeeded after {} attempt(s)", attempts);
                RunOutcome::Success(RunSuccess {
                    result,
                    sql: state.sql,
                    attempts,
                })
            }
            (_, _, Some(error)) if error.is_retryable() => self.failure(
                WorkflowError::RetriesExhausted {
                    attempts,
                    last: Box::new(error),
                },
                sql,
                attempts,
            ),
            (_, _, Some(error)) => self.failure(error, sql, attempts),
            (_, _, None) => self.failure(
                WorkflowError::Execution("Workflow ended without a result".to_string()),
                sql,
                attempts,
            ),
        }
    }

    fn failure(&self, error: WorkflowError, sql: Option<String>, attempts: u32) -> RunOutcome {
        info!("Run failed after {} attempt(s): {}", attempts, error);
        RunOutcome::Failure(RunFailure {
            error,
            sql,
            attempts,
        })
    }
}
