//! Dispatch planning and execution.
//!
//! A classified intent becomes a [`DispatchPlan`]: one request, one stream,
//! a fan-out over every target, or unroutable when the endpoint table lacks a
//! needed target.

use futures::future::join_all;
use switchboard_chart::resolve;
use switchboard_core::config::EndpointConfig;
use switchboard_core::Target;
use tracing::{info, warn};

use crate::backend::{request_once, Backend, BackendResult, DeltaStream};
use crate::classifier::Intent;
use crate::error::{BackendError, ChatError};
use crate::transcript::ChatEntry;

// =============================================================================
// Endpoint table
// =============================================================================

/// Static binding from target to backend address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointTable {
    knowledge: Option<String>,
    analytics_stream: Option<String>,
    analytics_once: Option<String>,
    tasks: Option<String>,
}

impl EndpointTable {
    pub fn from_config(config: &EndpointConfig) -> Self {
        Self {
            knowledge: config.resolve(&config.knowledge_path),
            analytics_stream: config.resolve(&config.analytics_stream_path),
            analytics_once: config.resolve(&config.analytics_once_path),
            tasks: config.resolve(&config.tasks_path),
        }
    }

    pub fn with_knowledge(mut self, url: impl Into<String>) -> Self {
        self.knowledge = Some(url.into());
        self
    }

    pub fn with_analytics(mut self, stream: impl Into<String>, once: impl Into<String>) -> Self {
        self.analytics_stream = Some(stream.into());
        self.analytics_once = Some(once.into());
        self
    }

    pub fn with_tasks(mut self, url: impl Into<String>) -> Self {
        self.tasks = Some(url.into());
        self
    }

    /// Address for a request/response call to `target`.
    pub fn request_endpoint(&self, target: Target) -> Result<&str, ChatError> {
        let endpoint = match target {
            Target::Knowledge => self.knowledge.as_deref(),
            Target::Analytics => self.analytics_once.as_deref(),
            Target::Tasks => self.tasks.as_deref(),
        };
        endpoint.ok_or(ChatError::Unroutable(target))
    }

    /// Address of the analytics stream.
    pub fn stream_endpoint(&self) -> Result<&str, ChatError> {
        self.analytics_stream
            .as_deref()
            .ok_or(ChatError::Unroutable(Target::Analytics))
    }
}

// =============================================================================
// Plans
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Request,
    Stream,
}

/// Members of a fan-out. Always two or more distinct targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutPlan {
    members: Vec<(Target, String)>,
}

impl FanoutPlan {
    /// Returns `None` unless `members` holds at least two distinct targets
    /// and no target twice.
    pub fn new(members: Vec<(Target, String)>) -> Option<Self> {
        let mut seen: Vec<Target> = members.iter().map(|(t, _)| *t).collect();
        seen.sort();
        seen.dedup();
        if seen.len() < 2 || seen.len() != members.len() {
            return None;
        }
        Some(Self { members })
    }

    /// Members in the order their entries are appended.
    pub fn members(&self) -> &[(Target, String)] {
        &self.members
    }

    pub fn targets(&self) -> Vec<Target> {
        self.members.iter().map(|(t, _)| *t).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchPlan {
    Single {
        target: Target,
        endpoint: String,
        mode: DispatchMode,
    },
    Fanout(FanoutPlan),
    /// The endpoint table has no address for `missing`.
    Unroutable { missing: Target },
}

impl DispatchPlan {
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            DispatchPlan::Single {
                mode: DispatchMode::Stream,
                ..
            }
        )
    }
}

// =============================================================================
// Execution
// =============================================================================

/// One backend's reply, tagged with the target that produced it.
#[derive(Debug)]
pub struct ResponseFragment {
    pub target: Target,
    pub outcome: Result<BackendResult, BackendError>,
}

impl ResponseFragment {
    /// Convert into the transcript entry for this reply.
    ///
    /// Failures become an error entry tagged with the failing target. A
    /// tabular payload gets its chart resolved and attached.
    pub fn into_entry(self) -> ChatEntry {
        match self.outcome {
            Ok(result) => {
                let chart = result.tabular().map(resolve);
                ChatEntry::assistant(result.content(), Some(self.target)).with_chart(chart)
            }
            Err(source) => {
                let err = ChatError::Transport {
                    target: self.target,
                    source,
                };
                ChatEntry::error(err.to_string(), Some(self.target))
            }
        }
    }
}

/// Result of executing a plan.
pub enum Execution {
    /// Every fragment, in plan order.
    Complete(Vec<ResponseFragment>),
    /// The analytics stream, or the error that prevented opening it.
    Stream {
        target: Target,
        opened: Result<DeltaStream, BackendError>,
    },
    Unroutable { missing: Target },
}

/// Plans and executes dispatch against a fixed endpoint table.
#[derive(Debug, Clone)]
pub struct Router {
    endpoints: EndpointTable,
}

impl Router {
    pub fn new(endpoints: EndpointTable) -> Self {
        Self { endpoints }
    }

    pub fn from_config(config: &EndpointConfig) -> Self {
        Self::new(EndpointTable::from_config(config))
    }

    pub fn endpoints(&self) -> &EndpointTable {
        &self.endpoints
    }

    /// Choose how to dispatch `intent`.
    ///
    /// Analytics alone streams, other single targets are one request, and
    /// mixed fans out over every target in declaration order regardless of
    /// which families matched.
    pub fn plan(&self, intent: Intent) -> DispatchPlan {
        match intent {
            Intent::Single(Target::Analytics) => match self.endpoints.stream_endpoint() {
                Ok(endpoint) => DispatchPlan::Single {
                    target: Target::Analytics,
                    endpoint: endpoint.to_string(),
                    mode: DispatchMode::Stream,
                },
                Err(_) => DispatchPlan::Unroutable {
                    missing: Target::Analytics,
                },
            },
            Intent::Single(target) => match self.endpoints.request_endpoint(target) {
                Ok(endpoint) => DispatchPlan::Single {
                    target,
                    endpoint: endpoint.to_string(),
                    mode: DispatchMode::Request,
                },
                Err(_) => DispatchPlan::Unroutable { missing: target },
            },
            Intent::Mixed => {
                let mut members = Vec::with_capacity(Target::ALL.len());
                for target in Target::ALL {
                    match self.endpoints.request_endpoint(target) {
                        Ok(endpoint) => members.push((target, endpoint.to_string())),
                        Err(_) => return DispatchPlan::Unroutable { missing: target },
                    }
                }
                match FanoutPlan::new(members) {
                    Some(fanout) => DispatchPlan::Fanout(fanout),
                    None => DispatchPlan::Unroutable {
                        missing: Target::Knowledge,
                    },
                }
            }
        }
    }

    /// Execute a plan.
    ///
    /// Fan-out members run concurrently and are all awaited; fragments come
    /// back in plan order, not completion order. A failed member does not
    /// affect its siblings.
    pub async fn execute(
        &self,
        backend: &dyn Backend,
        plan: &DispatchPlan,
        prompt: &str,
    ) -> Execution {
        match plan {
            DispatchPlan::Single {
                target,
                endpoint,
                mode: DispatchMode::Stream,
            } => {
                info!(backend = %target, "Opening stream");
                Execution::Stream {
                    target: *target,
                    opened: backend.analytics_ask(endpoint, prompt).await,
                }
            }
            DispatchPlan::Single {
                target,
                endpoint,
                mode: DispatchMode::Request,
            } => {
                info!(backend = %target, "Dispatching single request");
                let outcome = request_once(backend, *target, endpoint, prompt).await;
                if let Err(e) = &outcome {
                    warn!(backend = %target, error = %e, "Request failed");
                }
                Execution::Complete(vec![ResponseFragment {
                    target: *target,
                    outcome,
                }])
            }
            DispatchPlan::Fanout(fanout) => {
                info!(targets = ?fanout.targets(), "Fanning out");
                let requests = fanout.members().iter().map(|(target, endpoint)| async move {
                    let outcome = request_once(backend, *target, endpoint, prompt).await;
                    if let Err(e) = &outcome {
                        warn!(backend = %target, error = %e, "Fan-out member failed");
                    }
                    ResponseFragment {
                        target: *target,
                        outcome,
                    }
                });
                Execution::Complete(join_all(requests).await)
            }
            DispatchPlan::Unroutable { missing } => {
                warn!(missing = %missing, "No endpoint for prompt");
                Execution::Unroutable { missing: *missing }
            }
        }
    }
}
