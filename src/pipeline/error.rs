//! Error kinds for the monitoring pipeline
//!
//! Insufficient data and approval conflicts are NOT errors: the first yields
//! "no signal" (`None`), the second a `false` return from `approve`.

#[derive(Debug)]
pub enum SinkError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Storage(String),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err)
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "IO error: {}", e),
            SinkError::Serialization(e) => write!(f, "Serialization error: {}", e),
            SinkError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            SinkError::Serialization(e) => Some(e),
            SinkError::Storage(_) => None,
        }
    }
}

#[derive(Debug)]
pub enum PipelineError {
    /// Unknown metric name in a statistics lookup
    InvalidMetric(String),
    /// Store or audit write failed
    Sink(SinkError),
    /// A fault scenario is already running
    ScenarioActive(String),
}

impl From<SinkError> for PipelineError {
    fn from(err: SinkError) -> Self {
        PipelineError::Sink(err)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::InvalidMetric(name) => write!(f, "Unknown metric: {}", name),
            PipelineError::Sink(e) => write!(f, "Sink write failed: {}", e),
            PipelineError::ScenarioActive(name) => {
                write!(f, "Scenario '{}' is already running", name)
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Sink(e) => Some(e),
            _ => None,
        }
    }
}
