//! GitLab API client using reqwest

use std::time::Duration;

use gital_core::{CloneProtocol, Endpoint, Project};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::{Error, Result};

/// Header GitLab reads personal access tokens from
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// One project as listed by `GET /groups/:id`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitLabProject {
    pub name: String,
    /// Path relative to the group, used as the local directory name
    pub path: String,
    #[serde(default)]
    pub ssh_url_to_repo: Option<String>,
    #[serde(default)]
    pub http_url_to_repo: Option<String>,
}

impl GitLabProject {
    /// Clone URL for `protocol`, falling back to the other one
    pub fn clone_url(&self, protocol: CloneProtocol) -> Option<&str> {
        let (preferred, fallback) = match protocol {
            CloneProtocol::Ssh => (&self.ssh_url_to_repo, &self.http_url_to_repo),
            CloneProtocol::Https => (&self.http_url_to_repo, &self.ssh_url_to_repo),
        };
        preferred
            .as_deref()
            .or(fallback.as_deref())
            .filter(|url| !url.is_empty())
    }

    /// Convert into the record the orchestrator works on
    pub fn into_project(self, protocol: CloneProtocol) -> Result<Project> {
        let url = self
            .clone_url(protocol)
            .ok_or_else(|| Error::Decode(format!("project {} has no clone URL", self.name)))?
            .to_string();
        Ok(Project::new(self.name, self.path, url))
    }
}

#[derive(Debug, Deserialize)]
struct GroupResponse {
    #[serde(default)]
    projects: Vec<GitLabProject>,
}

/// GitLab API client for group inventory
pub struct GitLabClient {
    http: reqwest::Client,
    api_base: Url,
    token: String,
    timeout: Duration,
}

impl GitLabClient {
    /// Create a client for `base_url` + `postfix`, e.g.
    /// `https://gitlab.example.com` + `/api/v4/`
    pub fn new(
        base_url: &str,
        postfix: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let joined = format!("{base_url}{postfix}");
        let api_base = Url::parse(&joined).map_err(|e| Error::Url(format!("{joined}: {e}")))?;
        if api_base.cannot_be_a_base() {
            return Err(Error::Url(joined));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Request)?;

        info!(api = %api_base, "Created GitLab client");

        Ok(Self {
            http,
            api_base,
            token: token.into(),
            timeout,
        })
    }

    /// Create a client from a resolved configuration endpoint
    pub fn from_endpoint(endpoint: &Endpoint, token: impl Into<String>) -> Result<Self> {
        Self::new(&endpoint.url, &endpoint.postfix, token, endpoint.timeout)
    }

    /// URL of the group details resource; the key is a single
    /// percent-encoded segment so `parent/child` addresses a subgroup
    pub fn group_url(&self, group: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Url(self.api_base.to_string()))?
            .pop_if_empty()
            .push("groups")
            .push(group);
        Ok(url)
    }

    /// List the projects of `group`
    ///
    /// An empty group is not an error here; callers decide what to do with it.
    pub async fn group_projects(&self, group: &str) -> Result<Vec<GitLabProject>> {
        let url = self.group_url(group)?;
        debug!(%url, "Requesting group projects");

        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| Error::from_transport(e, self.timeout))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::from_transport(e, self.timeout))?;
        let group_response: GroupResponse =
            serde_json::from_slice(&body).map_err(|e| Error::Decode(e.to_string()))?;

        info!(
            group,
            count = group_response.projects.len(),
            "Fetched group projects"
        );

        Ok(group_response.projects)
    }
}

impl std::fmt::Debug for GitLabClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabClient")
            .field("api_base", &self.api_base.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
