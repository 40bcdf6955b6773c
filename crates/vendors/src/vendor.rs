use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reconap_core::{DomainError, DomainResult, Entity, TenantId, VendorId};

/// Vendor lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorStatus {
    Active,
    Inactive,
}

/// A supplier the tenant buys from.
///
/// `normalized_name` is not an independent field the caller sets directly;
/// it is always recomputed from `legal_name` by [`normalize_name`] so the
/// `(tenant, normalized_name)` uniqueness constraint means what it says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    id: VendorId,
    tenant_id: TenantId,
    legal_name: String,
    display_name: String,
    normalized_name: String,
    tax_id: Option<String>,
    aliases: Vec<String>,
    payment_terms_days: u32,
    status: VendorStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Vendor {
    pub fn register(
        id: VendorId,
        tenant_id: TenantId,
        legal_name: String,
        display_name: Option<String>,
        tax_id: Option<String>,
        payment_terms_days: u32,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let legal_name = legal_name.trim().to_string();
        if legal_name.is_empty() {
            return Err(DomainError::validation("legal_name cannot be empty"));
        }
        let normalized_name = normalize_name(&legal_name);
        if normalized_name.is_empty() {
            return Err(DomainError::validation(
                "legal_name does not normalize to a usable key",
            ));
        }

        Ok(Self {
            id,
            tenant_id,
            display_name: display_name
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| legal_name.clone()),
            legal_name,
            normalized_name,
            tax_id: tax_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            aliases: Vec::new(),
            payment_terms_days,
            status: VendorStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn legal_name(&self) -> &str {
        &self.legal_name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn normalized_name(&self) -> &str {
        &self.normalized_name
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref()
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn payment_terms_days(&self) -> u32 {
        self.payment_terms_days
    }

    pub fn status(&self) -> VendorStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == VendorStatus::Active
    }

    /// All names a fuzzy vendor match should be willing to compare against:
    /// the legal name, display name (if distinct), and every alias.
    pub fn match_candidates(&self) -> Vec<&str> {
        let mut names = vec![self.legal_name.as_str()];
        if self.display_name != self.legal_name {
            names.push(self.display_name.as_str());
        }
        names.extend(self.aliases.iter().map(|a| a.as_str()));
        names
    }

    pub fn add_alias(&mut self, alias: String, now: DateTime<Utc>) -> DomainResult<()> {
        let alias = alias.trim().to_string();
        if alias.is_empty() {
            return Err(DomainError::validation("alias cannot be empty"));
        }
        if !self.aliases.iter().any(|a| a == &alias) {
            self.aliases.push(alias);
            self.updated_at = now;
        }
        Ok(())
    }

    pub fn rename(&mut self, legal_name: String, now: DateTime<Utc>) -> DomainResult<()> {
        let legal_name = legal_name.trim().to_string();
        if legal_name.is_empty() {
            return Err(DomainError::validation("legal_name cannot be empty"));
        }
        self.normalized_name = normalize_name(&legal_name);
        self.legal_name = legal_name;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_status(&mut self, status: VendorStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl Entity for Vendor {
    type Id = VendorId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Deterministic normalization used for the vendor uniqueness key and for
/// seeding fuzzy-match comparisons: uppercase ASCII folding, punctuation
/// stripped to single spaces, legal-entity suffixes dropped, whitespace
/// collapsed.
pub fn normalize_name(raw: &str) -> String {
    const SUFFIXES: &[&str] = &[
        "INC", "INCORPORATED", "LLC", "LLP", "LTD", "LIMITED", "CORP", "CORPORATION", "CO",
        "COMPANY", "PLC", "GMBH",
    ];

    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_uppercase());
        } else if !cleaned.ends_with(' ') {
            cleaned.push(' ');
        }
    }

    let mut words: Vec<&str> = cleaned.split_whitespace().collect();
    while let Some(last) = words.last() {
        if SUFFIXES.contains(last) {
            words.pop();
        } else {
            break;
        }
    }

    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new()
    }

    #[test]
    fn register_normalizes_legal_name() {
        let vendor = Vendor::register(
            reconap_core::VendorId::new(),
            tenant(),
            "Acme Supply, Inc.".to_string(),
            None,
            None,
            30,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(vendor.normalized_name(), "ACME SUPPLY");
        assert_eq!(vendor.display_name(), "Acme Supply, Inc.");
    }

    #[test]
    fn normalize_name_strips_legal_suffixes_and_punctuation() {
        assert_eq!(normalize_name("Acme Supply, Inc."), "ACME SUPPLY");
        assert_eq!(normalize_name("Acme Supply LLC"), "ACME SUPPLY");
        assert_eq!(normalize_name("  acme   supply  "), "ACME SUPPLY");
        assert_eq!(normalize_name("Acme & Supply Co."), "ACME SUPPLY");
    }

    #[test]
    fn normalize_name_is_deterministic() {
        let a = normalize_name("Widgets of Texas, LLC");
        let b = normalize_name("Widgets of Texas, LLC");
        assert_eq!(a, b);
    }

    #[test]
    fn register_rejects_blank_legal_name() {
        let err = Vendor::register(
            reconap_core::VendorId::new(),
            tenant(),
            "   ".to_string(),
            None,
            None,
            30,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn add_alias_is_idempotent() {
        let mut vendor = Vendor::register(
            reconap_core::VendorId::new(),
            tenant(),
            "Acme Supply".to_string(),
            None,
            None,
            30,
            Utc::now(),
        )
        .unwrap();
        vendor.add_alias("Acme Supply Co".to_string(), Utc::now()).unwrap();
        vendor.add_alias("Acme Supply Co".to_string(), Utc::now()).unwrap();
        assert_eq!(vendor.aliases().len(), 1);
    }
}
