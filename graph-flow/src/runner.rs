//! FlowRunner – loads a session, executes one graph step, and saves the session back.
//!
//! Interactive services run one step per request: the handler puts the user's input
//! into the session context, calls [`FlowRunner::run`] (or [`FlowRunner::run_from`] when
//! the action belongs to a specific task), and answers with the step's response.

use std::sync::Arc;

use tracing::info;

use crate::{
    error::{GraphError, Result},
    graph::{ExecutionResult, Graph},
    storage::SessionStorage,
};

/// High-level helper that orchestrates the common _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    graph: Arc<Graph>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(graph: Arc<Graph>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { graph, storage }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Execute the session's current task and persist the updated session.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| GraphError::SessionNotFound(session_id.to_string()))?;

        let result = self.graph.execute_session(&mut session).await?;
        self.storage.save(session).await?;

        Ok(result)
    }

    /// Point the session at `task_id`, then run one step from there.
    ///
    /// Used when the user triggers an action out of the default order, e.g. replacing
    /// the record after a summary already exists.
    pub async fn run_from(&self, session_id: &str, task_id: &str) -> Result<ExecutionResult> {
        if !self.graph.has_task(task_id) {
            return Err(GraphError::TaskNotFound(task_id.to_string()));
        }

        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| GraphError::SessionNotFound(session_id.to_string()))?;

        if session.current_task_id != task_id {
            info!(
                session_id = %session_id,
                from = %session.current_task_id,
                to = %task_id,
                "Jumping to task"
            );
            session.current_task_id = task_id.to_string();
        }

        let result = self.graph.execute_session(&mut session).await?;
        self.storage.save(session).await?;

        Ok(result)
    }
}
