use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, header};
use url::Url;

use crate::fetcher::{FetchError, RepoEntry, RepositoryFetcher};

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
pub const DEFAULT_USER_AGENT: &str = concat!("component-docs/", env!("CARGO_PKG_VERSION"));

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Client for the GitHub contents API of one repository.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: Option<String>,
    user_agent: String,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GitHubClient {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self::new_with_base_url(DEFAULT_API_BASE_URL, owner, repo)
    }

    pub fn new_with_base_url(base_url: &str, owner: &str, repo: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: None,
            token: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch.filter(|b| !b.is_empty());
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    fn contents_url(&self, path: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.base_url)?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
            segments
                .pop_if_empty()
                .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        if let Some(branch) = &self.branch {
            url.query_pairs_mut().append_pair("ref", branch);
        }
        Ok(url)
    }

    /// Attaches the client identification and, when configured, the credential.
    fn request(&self, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .get(url)
            .header(header::USER_AGENT, &self.user_agent);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_checked(&self, builder: RequestBuilder, url: &str) -> Result<Response, FetchError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RepositoryFetcher for GitHubClient {
    async fn list_directory(&self, path: &str) -> Result<Vec<RepoEntry>, FetchError> {
        let url = self.contents_url(path)?;
        tracing::info!("Listing {}/{} contents at '{}'", self.owner, self.repo, path);

        let builder = self.request(url.as_str()).header(header::ACCEPT, GITHUB_ACCEPT);
        let response = self.send_checked(builder, url.as_str()).await?;
        let payload: serde_json::Value = response.json().await?;

        if !payload.is_array() {
            return Err(FetchError::UnexpectedPayload {
                url: url.to_string(),
                message: "expected directory listing".to_string(),
            });
        }

        serde_json::from_value(payload).map_err(|e| FetchError::UnexpectedPayload {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn fetch_file(&self, entry: &RepoEntry) -> Result<String, FetchError> {
        let download_url = entry
            .download_url
            .as_deref()
            .ok_or_else(|| FetchError::MissingDownloadUrl(entry.path.clone()))?;
        tracing::debug!("Fetching file from: {}", download_url);

        let response = self
            .send_checked(self.request(download_url), download_url)
            .await?;
        Ok(response.text().await?)
    }
}
