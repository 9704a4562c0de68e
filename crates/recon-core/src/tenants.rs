use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-tenant receipt policy, owned by the onboarding/settings side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Fiscal store identifier. No receipts are issued while it is unset.
    pub fiscal_store_id: Option<String>,
    /// Orders paid before this instant are never fiscalized.
    pub receipts_start_date: Option<DateTime<Utc>>,
    /// Allow sale receipts for cash-on-delivery orders without a transaction ref.
    pub cod_receipts_enabled: bool,
}

impl TenantSettings {
    #[must_use]
    pub fn has_fiscal_store(&self) -> bool {
        self.fiscal_store_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

/// A connected merchant store.
#[derive(Clone, PartialEq, Eq)]
pub struct Tenant {
    /// Upstream site/store identifier.
    pub id: String,
    /// Bearer credential for the commerce API, maintained by the token service.
    pub access_token: Option<String>,
    pub settings: TenantSettings,
    pub is_active: bool,
}

impl std::fmt::Debug for Tenant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tenant")
            .field("id", &self.id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("settings", &self.settings)
            .field("is_active", &self.is_active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fiscal_store_id_does_not_count() {
        let mut settings = TenantSettings::default();
        assert!(!settings.has_fiscal_store());
        settings.fiscal_store_id = Some("   ".to_string());
        assert!(!settings.has_fiscal_store());
        settings.fiscal_store_id = Some("FS-001".to_string());
        assert!(settings.has_fiscal_store());
    }

    #[test]
    fn debug_redacts_access_token() {
        let tenant = Tenant {
            id: "site-1".to_string(),
            access_token: Some("secret-token".to_string()),
            settings: TenantSettings::default(),
            is_active: true,
        };
        let rendered = format!("{tenant:?}");
        assert!(!rendered.contains("secret-token"));
    }
}
