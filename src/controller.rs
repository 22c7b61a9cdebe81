//! Interaction controller
//!
//! Validates a submission, runs the selected agent, normalizes its result
//! and records the turn in the session.

use crate::agent::AgentInvoker;
use crate::error::AppError;
use crate::models::ChatTurn;
use crate::session::SessionHandle;
use crate::Result;
use tracing::{info, warn};

/// Releases the session's in-flight flag however the run ends.
struct InFlightGuard<'a> {
    session: &'a SessionHandle,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().finish_processing();
    }
}

/// Runs `query` against `agent` and appends the resulting turn to the session.
///
/// Blank queries and overlapping submissions are rejected without touching
/// the history. Invocation failures propagate unchanged.
pub async fn run(session: &SessionHandle, agent: &dyn AgentInvoker, query: &str) -> Result<ChatTurn> {
    if query.trim().is_empty() {
        return Err(AppError::EmptyQuery);
    }

    let session_id = {
        let mut state = session.lock();
        if !state.begin_processing() {
            warn!(session_id = %state.id(), "Rejected submission while another query is running");
            return Err(AppError::Busy);
        }
        state.id()
    };
    let _guard = InFlightGuard { session };

    info!(session_id = %session_id, agent = agent.name(), "{} is processing...", agent.name());

    let response = agent.invoke(session_id, query).await?;
    let turn = ChatTurn::new(query, response.normalized());

    session.lock().push_turn(agent.name(), turn.clone());

    Ok(turn)
}
