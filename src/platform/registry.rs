//! Adapter registry
//!
//! Maps each [`ScmTool`] to its platform adapter. The default set covers
//! all five supported platforms; tests swap in stub adapters through
//! [`AdapterRegistry::register`].

use std::collections::HashMap;
use std::sync::Arc;

use super::azure::AzureReposAdapter;
use super::bitbucket_cloud::BitbucketCloudAdapter;
use super::bitbucket_server::BitbucketServerAdapter;
use super::github::{GithubAdapter, GithubRateLimitMonitor};
use super::gitlab::{GitlabAdapter, GitlabRateLimitMonitor};
use super::traits::PlatformAdapter;
use crate::core::config::HttpConfig;
use crate::ratelimit::monitor::RateLimitMonitor;
use crate::scm::error::{ScmError, ScmResult};
use crate::scm::tool::ScmTool;

pub struct AdapterRegistry {
    adapters: HashMap<ScmTool, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with one adapter per supported platform
    pub fn with_defaults(http: &HttpConfig) -> ScmResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(GithubAdapter::new(http)?));
        registry.register(Arc::new(GitlabAdapter::new(http)?));
        registry.register(Arc::new(BitbucketCloudAdapter::new(http)?));
        registry.register(Arc::new(BitbucketServerAdapter::new(http)?));
        registry.register(Arc::new(AzureReposAdapter::new(http)?));
        Ok(registry)
    }

    /// Registers an adapter under the tool it reports. A later
    /// registration for the same tool replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.tool(), adapter);
    }

    pub fn get(&self, tool: ScmTool) -> ScmResult<Arc<dyn PlatformAdapter>> {
        self.adapters
            .get(&tool)
            .cloned()
            .ok_or_else(|| ScmError::Configuration {
                message: format!("No adapter registered for tool '{}'", tool),
            })
    }

    pub fn registered_tools(&self) -> Vec<ScmTool> {
        let mut tools: Vec<ScmTool> = self.adapters.keys().copied().collect();
        tools.sort_by_key(|tool| tool.to_string());
        tools
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limit monitors for the platforms that publish usage data.
/// Bitbucket and Azure Repos expose no queryable quota endpoint, so
/// scans against them proceed without a probe.
pub fn default_monitors(http: &HttpConfig) -> ScmResult<Vec<Arc<dyn RateLimitMonitor>>> {
    Ok(vec![
        Arc::new(GithubRateLimitMonitor::new(http)?),
        Arc::new(GitlabRateLimitMonitor::new(http)?),
    ])
}
