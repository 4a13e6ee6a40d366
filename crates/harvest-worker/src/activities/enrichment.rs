// Enrichment activities: GitHub repositories, web-page links, entry links.

use harvest_contracts::entry::ExtractedLink;
use harvest_durable::prelude::*;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::activities::client_error_or_raise;
use crate::models::*;
use crate::services::Services;

/// Owner/repo pair from a github.com URL, ignoring deeper paths.
fn parse_github_repo(link: &str) -> Option<(String, String)> {
    let url = Url::parse(link).ok()?;
    let host = url.host_str()?.to_lowercase();
    if host != "github.com" && host != "www.github.com" {
        return None;
    }
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let owner = segments.next()?.to_string();
    let repo = segments
        .next()?
        .trim_end_matches(".git")
        .to_string();
    if owner.is_empty() || repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

#[derive(Debug, Deserialize)]
struct GithubRepoResponse {
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    stargazers_count: u32,
    #[serde(default)]
    forks_count: u32,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    homepage: Option<String>,
}

/// Resolve GitHub repositories referenced by an entry's links.
pub struct SearchGithubRepositories {
    svc: Services,
}

impl SearchGithubRepositories {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for SearchGithubRepositories {
    const TYPE: &'static str = "search_github_repositories";
    type Input = SearchGithubRepositoriesInput;
    type Output = SearchGithubRepositoriesOutput;

    async fn execute(
        &self,
        ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        let mut candidates: Vec<(String, String)> = Vec::new();
        for link in &input.links {
            if let Some(pair) = parse_github_repo(&link.url) {
                if !candidates.contains(&pair) {
                    candidates.push(pair);
                }
            }
        }
        if candidates.is_empty() {
            return Ok(SearchGithubRepositoriesOutput::default());
        }

        let mut repos = Vec::new();
        for (owner, repo) in candidates {
            ctx.heartbeat();
            let mut request = self
                .svc
                .http
                .get(format!("https://api.github.com/repos/{owner}/{repo}"))
                .header("Accept", "application/vnd.github+json");
            if !self.svc.config.github_token.is_empty() {
                request = request.header(
                    "Authorization",
                    format!("Bearer {}", self.svc.config.github_token),
                );
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    warn!(owner, repo, error = %err, "github lookup failed");
                    continue;
                }
            };
            if response.status().as_u16() == 404 {
                debug!(owner, repo, "repository not found");
                continue;
            }
            if !response.status().is_success() {
                warn!(owner, repo, status = %response.status(), "github lookup rejected");
                continue;
            }
            let Ok(body) = response.json::<GithubRepoResponse>().await else {
                continue;
            };
            repos.push(GithubRepoInfo {
                owner: owner.clone(),
                repo: repo.clone(),
                full_name: body.full_name,
                description: body.description.unwrap_or_default(),
                url: body.html_url,
                stars: body.stargazers_count,
                forks: body.forks_count,
                language: body.language.unwrap_or_default(),
                topics: body.topics,
                homepage: body.homepage.unwrap_or_default(),
            });
        }

        info!(entry_id = %input.entry_id, found = repos.len(), "github lookup finished");
        Ok(SearchGithubRepositoriesOutput {
            repos,
            error: String::new(),
        })
    }
}

/// Save GitHub enrichments, deleting all existing GitHub rows for the entry
/// first so repeat submissions stay idempotent.
pub struct SaveGithubEnrichment {
    svc: Services,
}

impl SaveGithubEnrichment {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for SaveGithubEnrichment {
    const TYPE: &'static str = "save_github_enrichment";
    type Input = SaveGithubEnrichmentInput;
    type Output = SaveGithubEnrichmentOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        match self
            .svc
            .api
            .delete_enrichment(&input.entry_id, "github", None)
            .await
        {
            Ok(deleted) => {
                if deleted > 0 {
                    debug!(entry_id = %input.entry_id, deleted, "removed stale github enrichments");
                }
            }
            Err(err) => {
                let message = client_error_or_raise(err)?;
                warn!(entry_id = %input.entry_id, error = %message, "stale enrichment delete rejected");
            }
        }

        if input.repos.is_empty() {
            return Ok(SaveGithubEnrichmentOutput {
                success: true,
                saved_count: 0,
                error: String::new(),
            });
        }

        let mut saved_count = 0;
        let mut errors = Vec::new();
        for repo in &input.repos {
            let data = serde_json::to_value(repo).unwrap_or_default();
            match self
                .svc
                .api
                .save_enrichment(&input.entry_id, "github", &data, Some(&repo.url))
                .await
            {
                Ok(()) => saved_count += 1,
                Err(err) => {
                    let message = client_error_or_raise(err)?;
                    errors.push(format!("{}: {message}", repo.url));
                }
            }
        }

        info!(entry_id = %input.entry_id, saved_count, "saved github enrichments");
        Ok(SaveGithubEnrichmentOutput {
            success: errors.is_empty(),
            saved_count,
            error: errors.join("; "),
        })
    }
}

pub struct SaveWebPageEnrichment {
    svc: Services,
}

impl SaveWebPageEnrichment {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for SaveWebPageEnrichment {
    const TYPE: &'static str = "save_web_page_enrichment";
    type Input = SaveWebPageEnrichmentInput;
    type Output = SaveWebPageEnrichmentOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.web_pages.is_empty() {
            return Ok(SaveWebPageEnrichmentOutput {
                success: true,
                ..Default::default()
            });
        }
        let data = serde_json::json!({
            "webPages": input.web_pages.iter().map(|wp| {
                serde_json::json!({ "url": wp.url, "title": wp.title })
            }).collect::<Vec<_>>(),
        });
        match self
            .svc
            .api
            .save_enrichment(&input.entry_id, "web_page", &data, Some("extracted_links"))
            .await
        {
            Ok(()) => Ok(SaveWebPageEnrichmentOutput {
                success: true,
                saved_count: input.web_pages.len() as u32,
                error: String::new(),
            }),
            Err(err) => {
                let message = client_error_or_raise(err)?;
                Ok(SaveWebPageEnrichmentOutput {
                    success: false,
                    saved_count: 0,
                    error: message,
                })
            }
        }
    }
}

pub struct SaveEntryLinks {
    svc: Services,
}

impl SaveEntryLinks {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for SaveEntryLinks {
    const TYPE: &'static str = "save_entry_links";
    type Input = SaveEntryLinksInput;
    type Output = SaveEntryLinksOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        if input.links.is_empty() {
            return Ok(SaveEntryLinksOutput {
                success: true,
                ..Default::default()
            });
        }
        let links: Vec<_> = input
            .links
            .iter()
            .map(|l: &ExtractedLink| serde_json::json!({ "url": l.url, "title": l.title }))
            .collect();
        match self
            .svc
            .api
            .save_entry_links(&input.entry_id, &serde_json::Value::Array(links))
            .await
        {
            Ok(saved_count) => Ok(SaveEntryLinksOutput {
                success: true,
                saved_count,
                error: String::new(),
            }),
            Err(err) => {
                let message = client_error_or_raise(err)?;
                Ok(SaveEntryLinksOutput {
                    success: false,
                    saved_count: 0,
                    error: message,
                })
            }
        }
    }
}

pub struct DeleteEnrichment {
    svc: Services,
}

impl DeleteEnrichment {
    pub fn new(svc: Services) -> Self {
        Self { svc }
    }
}

#[async_trait]
impl Activity for DeleteEnrichment {
    const TYPE: &'static str = "delete_enrichment";
    type Input = DeleteEnrichmentActivityInput;
    type Output = DeleteEnrichmentActivityOutput;

    async fn execute(
        &self,
        _ctx: &ActivityContext,
        input: Self::Input,
    ) -> Result<Self::Output, ActivityError> {
        match self
            .svc
            .api
            .delete_enrichment(
                &input.entry_id,
                &input.enrichment_type,
                input.source.as_deref(),
            )
            .await
        {
            Ok(deleted_count) => {
                info!(
                    entry_id = %input.entry_id,
                    enrichment_type = %input.enrichment_type,
                    deleted_count,
                    "deleted enrichment"
                );
                Ok(DeleteEnrichmentActivityOutput {
                    deleted: deleted_count > 0,
                    error: String::new(),
                })
            }
            Err(err) => {
                let message = client_error_or_raise(err)?;
                Ok(DeleteEnrichmentActivityOutput {
                    deleted: false,
                    error: message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_urls_are_parsed() {
        assert_eq!(
            parse_github_repo("https://github.com/rust-lang/rust"),
            Some(("rust-lang".to_string(), "rust".to_string()))
        );
        assert_eq!(
            parse_github_repo("https://github.com/tokio-rs/tokio/issues/42"),
            Some(("tokio-rs".to_string(), "tokio".to_string()))
        );
        assert_eq!(
            parse_github_repo("https://github.com/serde-rs/serde.git"),
            Some(("serde-rs".to_string(), "serde".to_string()))
        );
        assert_eq!(parse_github_repo("https://github.com/onlyowner"), None);
        assert_eq!(parse_github_repo("https://gitlab.com/a/b"), None);
        assert_eq!(parse_github_repo("not a url"), None);
    }
}
