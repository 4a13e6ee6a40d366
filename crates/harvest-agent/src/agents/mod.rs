// Mode handlers behind the AG-UI endpoint.

pub mod dialogue;
pub mod research;

use crate::routes::ag_ui::RunAgentInput;
use crate::state::SharedState;

/// Rendered entry context, when the client forwarded an entry id.
pub async fn get_entry_context(state: &SharedState, input: &RunAgentInput) -> Option<String> {
    let entry_id = input.entry_id()?;
    let entry = state.entries.get_entry(entry_id).await?;
    Some(state.entries.build_context(&entry))
}
