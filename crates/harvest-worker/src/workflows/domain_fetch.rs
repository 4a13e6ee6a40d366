// Host-aware content fetching: hosts run in parallel, entries within a host
// run serially with a configurable delay between requests, and each fetched
// entry immediately gets its link and GitHub enrichments.

use std::time::Duration;

use futures::future::join_all;
use harvest_contracts::entry::ExtractedLink;
use harvest_durable::prelude::*;
use tracing::{debug, warn};

use crate::activities::{
    FetchSingleContent, SaveEntryLinks, SaveGithubEnrichment, SaveWebPageEnrichment,
    SearchGithubRepositories,
};
use crate::models::*;
use crate::urlutil::group_by_host;
use crate::workflows::progress::ProgressHandle;

pub struct DomainFetchWorkflow;

#[async_trait]
impl Workflow for DomainFetchWorkflow {
    const TYPE: &'static str = "domain_fetch";
    type Input = DomainFetchInput;
    type Output = DomainFetchResult;

    async fn run(
        &self,
        ctx: WorkflowCtx,
        input: Self::Input,
    ) -> Result<Self::Output, WorkflowError> {
        let progress = ProgressHandle::begin(&ctx);
        let outcome = run_inner(&ctx, input, &progress).await;
        if let Err(err) = &outcome {
            progress.fail(&ctx, err.to_string()).await;
        }
        outcome
    }
}

async fn run_inner(
    ctx: &WorkflowCtx,
    input: DomainFetchInput,
    progress: &ProgressHandle,
) -> Result<DomainFetchResult, WorkflowError> {
    let total = input.targets.len();
    let groups = group_by_host(input.targets, |t| t.url.as_str());
    let delay = Duration::from_secs_f64(input.delay_seconds.max(0.0));

    progress.update(|p| {
        p.set_counter("total", total as i64);
        p.set_counter("hosts", groups.len() as i64);
    });
    progress
        .step(
            ctx,
            "fetching",
            format!("Fetching {} entries across {} hosts", total, groups.len()),
        )
        .await;

    let host_tasks = groups.into_iter().enumerate().map(|(host_index, (host, targets))| {
        // Each host runs in its own branch so interleaved polling keeps a
        // stable history across replays.
        let ctx = ctx.branch(host_index as u32);
        let progress = progress.clone();
        async move {
            let mut fetched = 0u32;
            let mut failed = 0u32;
            let count = targets.len();

            for (i, target) in targets.into_iter().enumerate() {
                let entry_id = target.entry_id.clone();
                match ctx
                    .activity::<FetchSingleContent>(
                        FetchSingleContentInput { target },
                        ActivityOptions::long(Duration::from_secs(120)),
                    )
                    .await
                {
                    Ok(output) if output.fetched => {
                        fetched += 1;
                        enrich_entry(&ctx, &entry_id, output.links).await?;
                    }
                    Ok(output) => {
                        failed += 1;
                        debug!(entry_id = %entry_id, host = %host, reason = %output.error, "fetch skipped");
                    }
                    Err(err) if err.is_cancelled() => return Err(WorkflowError::cancelled()),
                    Err(err) => {
                        failed += 1;
                        warn!(entry_id = %entry_id, host = %host, error = %err, "fetch failed");
                    }
                }

                progress.update(|p| p.add_counter("done", 1));
                progress.notify(&ctx).await;

                if i + 1 < count {
                    ctx.sleep(delay).await?;
                }
            }
            Ok::<(u32, u32), WorkflowError>((fetched, failed))
        }
    });

    let mut result = DomainFetchResult {
        status: "completed".to_string(),
        ..Default::default()
    };
    for outcome in join_all(host_tasks).await {
        let (fetched, failed) = outcome?;
        result.fetched_count += fetched;
        result.failed_count += failed;
    }

    progress
        .complete(
            ctx,
            format!(
                "Fetched {} entries ({} failed)",
                result.fetched_count, result.failed_count
            ),
        )
        .await;
    Ok(result)
}

/// Save links and enrichments for a freshly fetched entry. Enrichment
/// failures never fail the fetch; only cancellation propagates.
async fn enrich_entry(
    ctx: &WorkflowCtx,
    entry_id: &str,
    links: Vec<ExtractedLink>,
) -> Result<(), WorkflowError> {
    if links.is_empty() {
        return Ok(());
    }

    if let Err(err) = ctx
        .activity::<SaveEntryLinks>(
            SaveEntryLinksInput {
                entry_id: entry_id.to_string(),
                links: links.clone(),
            },
            ActivityOptions::short(),
        )
        .await
    {
        if err.is_cancelled() {
            return Err(WorkflowError::cancelled());
        }
        warn!(entry_id, error = %err, "link save failed");
    }

    if let Err(err) = ctx
        .activity::<SaveWebPageEnrichment>(
            SaveWebPageEnrichmentInput {
                entry_id: entry_id.to_string(),
                web_pages: links.clone(),
            },
            ActivityOptions::short(),
        )
        .await
    {
        if err.is_cancelled() {
            return Err(WorkflowError::cancelled());
        }
        warn!(entry_id, error = %err, "web page enrichment failed");
    }

    let has_github = links.iter().any(|l| l.url.contains("github.com/"));
    if !has_github {
        return Ok(());
    }
    let repos = match ctx
        .activity::<SearchGithubRepositories>(
            SearchGithubRepositoriesInput {
                entry_id: entry_id.to_string(),
                links,
            },
            ActivityOptions::long(Duration::from_secs(120)).with_heartbeat(Duration::from_secs(30)),
        )
        .await
    {
        Ok(output) => output.repos,
        Err(err) if err.is_cancelled() => return Err(WorkflowError::cancelled()),
        Err(err) => {
            warn!(entry_id, error = %err, "github lookup failed");
            return Ok(());
        }
    };

    if let Err(err) = ctx
        .activity::<SaveGithubEnrichment>(
            SaveGithubEnrichmentInput {
                entry_id: entry_id.to_string(),
                repos,
            },
            ActivityOptions::short(),
        )
        .await
    {
        if err.is_cancelled() {
            return Err(WorkflowError::cancelled());
        }
        warn!(entry_id, error = %err, "github enrichment save failed");
    }
    Ok(())
}
