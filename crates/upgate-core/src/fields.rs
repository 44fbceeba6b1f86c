//! Process-wide log fields.
//!
//! Every log line carries where the function runs: its name, region, and
//! version as reported by the platform, plus the deployment stage and, when
//! known, the commit it was built from.

/// Fields attached to every log line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFields {
    pub app: String,
    pub region: String,
    pub version: String,
    pub stage: String,
    pub commit: Option<String>,
}

impl LogFields {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            app: lookup("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_default(),
            region: lookup("AWS_REGION").unwrap_or_default(),
            version: lookup("AWS_LAMBDA_FUNCTION_VERSION").unwrap_or_default(),
            stage: lookup("UP_STAGE").unwrap_or_default(),
            commit: lookup("UP_COMMIT").filter(|c| !c.is_empty()),
        }
    }
}
