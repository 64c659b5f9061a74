use super::entry::Level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
    #[serde(other)]
    Unknown,
}

/// A container known to the viewer, as listed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRef {
    pub host: String,
    pub id: String,
    pub name: String,
    pub state: ContainerState,
}

impl ContainerRef {
    pub fn new(host: &str, id: &str, name: &str, state: ContainerState) -> Self {
        Self {
            host: host.to_string(),
            id: id.to_string(),
            name: name.to_string(),
            state,
        }
    }

    /// Path segments of the history endpoint for this container
    pub fn history_segments(&self) -> Vec<String> {
        vec![
            "api".to_string(),
            "hosts".to_string(),
            self.host.clone(),
            "containers".to_string(),
            self.id.clone(),
            "logs".to_string(),
        ]
    }
}

/// What a log viewer is streaming
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Container(ContainerRef),
    Stack {
        name: String,
        containers: Vec<ContainerRef>,
    },
    Service {
        name: String,
        containers: Vec<ContainerRef>,
    },
    Group {
        name: String,
        containers: Vec<ContainerRef>,
    },
    Merged {
        host: String,
        containers: Vec<ContainerRef>,
    },
}

impl Target {
    /// Identity of the target; a change means the visible sequence starts over
    pub fn identity(&self) -> String {
        match self {
            Target::Container(c) => format!("container:{}:{}", c.host, c.id),
            Target::Stack { name, .. } => format!("stack:{}", name),
            Target::Service { name, .. } => format!("service:{}", name),
            Target::Group { name, .. } => format!("group:{}", name),
            Target::Merged { host, containers } => {
                let ids: Vec<&str> = containers.iter().map(|c| c.id.as_str()).collect();
                format!("merged:{}:{}", host, ids.join(","))
            }
        }
    }

    /// Containers whose history can be fetched for this target
    pub fn containers(&self) -> &[ContainerRef] {
        match self {
            Target::Container(c) => std::slice::from_ref(c),
            Target::Stack { containers, .. }
            | Target::Service { containers, .. }
            | Target::Group { containers, .. }
            | Target::Merged { containers, .. } => containers,
        }
    }

    /// Container to attribute stream entries to when events don't carry one
    pub fn default_container(&self) -> Option<&str> {
        match self {
            Target::Container(c) => Some(&c.id),
            _ => None,
        }
    }

    /// Whether the target is a single container that is currently running
    pub fn is_running(&self) -> bool {
        matches!(self, Target::Container(c) if c.state == ContainerState::Running)
    }

    pub fn stream_segments(&self) -> Vec<String> {
        let mut segments = vec!["api".to_string()];
        match self {
            Target::Container(c) => {
                segments.extend([
                    "hosts".to_string(),
                    c.host.clone(),
                    "containers".to_string(),
                    c.id.clone(),
                    "logs".to_string(),
                    "stream".to_string(),
                ]);
            }
            Target::Stack { name, .. } => {
                segments.extend(["stacks".to_string(), name.clone(), "logs".to_string(), "stream".to_string()]);
            }
            Target::Service { name, .. } => {
                segments.extend(["services".to_string(), name.clone(), "logs".to_string(), "stream".to_string()]);
            }
            Target::Group { name, .. } => {
                segments.extend(["groups".to_string(), name.clone(), "logs".to_string(), "stream".to_string()]);
            }
            Target::Merged { host, .. } => {
                segments.extend([
                    "hosts".to_string(),
                    host.clone(),
                    "logs".to_string(),
                    "mergedStream".to_string(),
                ]);
            }
        }
        segments
    }

    /// Target-specific query parameters of the stream URL
    pub fn stream_query(&self) -> Vec<(String, String)> {
        match self {
            Target::Merged { containers, .. } => containers
                .iter()
                .map(|c| ("id".to_string(), c.id.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Which output streams and levels the viewer asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_true")]
    pub stdout: bool,
    #[serde(default = "default_true")]
    pub stderr: bool,
    #[serde(default)]
    pub levels: BTreeSet<Level>,
}

fn default_true() -> bool {
    true
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            levels: BTreeSet::new(),
        }
    }
}

impl StreamConfig {
    pub fn query(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if self.stdout {
            params.push(("stdout".to_string(), "1".to_string()));
        }
        if self.stderr {
            params.push(("stderr".to_string(), "1".to_string()));
        }
        for level in &self.levels {
            params.push(("levels".to_string(), level.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container(id: &str, state: ContainerState) -> ContainerRef {
        ContainerRef::new("local", id, &format!("name-{}", id), state)
    }

    #[test]
    fn test_container_stream_segments() {
        let target = Target::Container(container("abc", ContainerState::Running));
        assert_eq!(
            target.stream_segments().join("/"),
            "api/hosts/local/containers/abc/logs/stream"
        );
        assert!(target.stream_query().is_empty());
        assert_eq!(target.default_container(), Some("abc"));
    }

    #[test]
    fn test_grouped_stream_segments() {
        let stack = Target::Stack { name: "web".to_string(), containers: vec![] };
        let service = Target::Service { name: "api".to_string(), containers: vec![] };
        let group = Target::Group { name: "ops".to_string(), containers: vec![] };

        assert_eq!(stack.stream_segments().join("/"), "api/stacks/web/logs/stream");
        assert_eq!(service.stream_segments().join("/"), "api/services/api/logs/stream");
        assert_eq!(group.stream_segments().join("/"), "api/groups/ops/logs/stream");
        assert!(stack.default_container().is_none());
    }

    #[test]
    fn test_merged_target_lists_ids() {
        let target = Target::Merged {
            host: "local".to_string(),
            containers: vec![
                container("a", ContainerState::Running),
                container("b", ContainerState::Running),
            ],
        };

        assert_eq!(target.stream_segments().join("/"), "api/hosts/local/logs/mergedStream");
        assert_eq!(
            target.stream_query(),
            vec![
                ("id".to_string(), "a".to_string()),
                ("id".to_string(), "b".to_string())
            ]
        );
        assert_eq!(target.containers().len(), 2);
    }

    #[test]
    fn test_identity_ignores_container_state() {
        let running = Target::Container(container("abc", ContainerState::Running));
        let exited = Target::Container(container("abc", ContainerState::Exited));

        assert_eq!(running.identity(), exited.identity());
        assert!(running.is_running());
        assert!(!exited.is_running());
    }

    #[test]
    fn test_stream_config_query() {
        let mut config = StreamConfig::default();
        assert_eq!(
            config.query(),
            vec![
                ("stdout".to_string(), "1".to_string()),
                ("stderr".to_string(), "1".to_string())
            ]
        );

        config.stdout = false;
        config.levels.insert(Level::Warn);
        config.levels.insert(Level::Error);
        assert_eq!(
            config.query(),
            vec![
                ("stderr".to_string(), "1".to_string()),
                ("levels".to_string(), "error".to_string()),
                ("levels".to_string(), "warn".to_string())
            ]
        );
    }
}
