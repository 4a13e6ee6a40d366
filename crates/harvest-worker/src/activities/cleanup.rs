// Old-entry cleanup through the backend.
//
// The backend owns the predicate: isRead, not starred, not kept, published
// before the cutoff. Dry runs report the matching ids without deleting.

use harvest_durable::prelude::*;
use tracing::info;

use crate::activities::client_error_or_raise;
use crate::models::{CleanupOldEntriesInput, CleanupOldEntriesOutput};
use crate::services::Services;

pub struct CleanupOldEntries {
    svc: Services,
}

impl CleanupOldEntries {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for CleanupOldEntries {
    const TYPE: &'static str = "cleanup_old_entries";
    type Input = CleanupOldEntriesInput;
    type Output = CleanupOldEntriesOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        info!(
            older_than_days = input.older_than_days,
            dry_run = input.dry_run,
            "cleaning up old entries"
        );

        match self
            .svc
            .api
            .cleanup_entries(input.older_than_days, input.dry_run)
            .await
        {
            Ok(Some(result)) => {
                let action = if input.dry_run { "would delete" } else { "deleted" };
                info!(
                    action,
                    deleted_count = result.deleted_count,
                    cutoff_date = %result.cutoff_date,
                    "cleanup finished"
                );
                Ok(CleanupOldEntriesOutput {
                    deleted_count: result.deleted_count,
                    deleted_ids: result.deleted_ids,
                    cutoff_date: result.cutoff_date,
                    dry_run: input.dry_run,
                    error: String::new(),
                })
            }
            Ok(None) => Ok(CleanupOldEntriesOutput {
                dry_run: input.dry_run,
                error: "cleanup endpoint not available".to_string(),
                ..Default::default()
            }),
            Err(err) => {
                let message = client_error_or_raise(err)?;
                Ok(CleanupOldEntriesOutput {
                    dry_run: input.dry_run,
                    error: message,
                    ..Default::default()
                })
            }
        }
    }
}
