//! Backend client configuration

/// How often and how long to poll an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Seconds between status checks
    pub delay_secs: u64,

    /// Give up after this many checks; `None` waits indefinitely
    pub max_attempts: Option<u32>,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            delay_secs: 30,
            max_attempts: Some(60),
        }
    }
}

/// Configuration for a backend client
#[derive(Debug, Clone)]
pub struct BackendClientConfig {
    /// Base URL of the orchestration API
    pub endpoint: Option<String>,

    /// Timeout for individual requests in seconds
    pub timeout_secs: u64,

    /// Polling used by `wait`
    pub wait: WaitPolicy,
}

impl Default for BackendClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 60,
            wait: WaitPolicy::default(),
        }
    }
}

impl BackendClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_client_config_builder() {
        let config = BackendClientConfig::new()
            .with_endpoint("http://localhost:8080".to_string())
            .with_timeout(15)
            .with_wait(WaitPolicy {
                delay_secs: 1,
                max_attempts: None,
            });

        assert_eq!(config.endpoint, Some("http://localhost:8080".to_string()));
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.wait.max_attempts, None);
    }

    #[test]
    fn test_default_wait_policy() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.delay_secs, 30);
        assert_eq!(policy.max_attempts, Some(60));
    }
}
