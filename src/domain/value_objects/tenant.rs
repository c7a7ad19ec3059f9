use serde::{Deserialize, Serialize};

/// Isolation boundary. Every persisted row and every event belongs to exactly
/// one tenant; all read paths filter by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.is_empty() {
            return Err("tenant id must not be empty".to_string());
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(format!("tenant id contains invalid characters: {}", id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bus topic carrying this tenant's job events.
    pub fn jobs_topic(&self) -> String {
        format!("{}.jobs", self.0)
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_odd_characters() {
        assert!(TenantId::new("").is_err());
        assert!(TenantId::new("acme corp").is_err());
        assert!(TenantId::new("acme.corp").is_err());
        assert!(TenantId::new("acme-corp_01").is_ok());
    }

    #[test]
    fn topic_is_tenant_scoped() {
        let tenant = TenantId::new("acme").unwrap();
        assert_eq!(tenant.jobs_topic(), "acme.jobs");
    }
}
