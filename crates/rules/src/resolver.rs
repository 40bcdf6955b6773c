use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use reconap_core::{DomainResult, Money, TenantId, VendorId};

use crate::amount_band::{classify, default_bands, AmountBand};
use crate::rule_set::{RuleSet, RuleSetOverride};

/// Where a `RuleSetOverride` is anchored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ScopeKey {
    Global,
    VendorCategory(String),
    Vendor(VendorId),
    AmountBand(String),
}

struct CacheEntry {
    rule_set: RuleSet,
    computed_generation: u64,
    expires_at: Instant,
}

/// Resolves the effective rule set for a `(tenant, vendor, amount)` triple
/// by layering overrides from lowest to highest precedence: built-in
/// default, global, amount-band, vendor-category, vendor-specific.
///
/// A per-tenant generation counter is bumped on every layer edit; cached
/// entries record the generation they were computed against, so a stale
/// cache hit is detected without walking every cached key on write.
pub struct RuleResolver {
    bands: Vec<AmountBand>,
    global: RwLock<HashMap<TenantId, RuleSetOverride>>,
    vendor_category: RwLock<HashMap<(TenantId, String), RuleSetOverride>>,
    vendor: RwLock<HashMap<(TenantId, VendorId), RuleSetOverride>>,
    amount_band: RwLock<HashMap<(TenantId, String), RuleSetOverride>>,
    generation: RwLock<HashMap<TenantId, u64>>,
    cache: RwLock<HashMap<(TenantId, VendorId, String), CacheEntry>>,
    cache_ttl: Duration,
}

impl RuleResolver {
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            bands: default_bands(),
            global: RwLock::new(HashMap::new()),
            vendor_category: RwLock::new(HashMap::new()),
            vendor: RwLock::new(HashMap::new()),
            amount_band: RwLock::new(HashMap::new()),
            generation: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
            cache_ttl,
        }
    }

    fn bump_generation(&self, tenant_id: TenantId) {
        let mut gens = self.generation.write().expect("rules lock poisoned");
        *gens.entry(tenant_id).or_insert(0) += 1;
    }

    fn current_generation(&self, tenant_id: TenantId) -> u64 {
        *self.generation.read().expect("rules lock poisoned").get(&tenant_id).unwrap_or(&0)
    }

    /// Exactly one `global` override per tenant: setting it again replaces
    /// the prior value rather than appending.
    pub fn set_global(&self, tenant_id: TenantId, rule_set: RuleSetOverride) -> DomainResult<()> {
        rule_set.apply_over(RuleSet::built_in_default()).validate()?;
        self.global.write().expect("rules lock poisoned").insert(tenant_id, rule_set);
        self.bump_generation(tenant_id);
        Ok(())
    }

    pub fn set_vendor_category(&self, tenant_id: TenantId, category: String, rule_set: RuleSetOverride) {
        self.vendor_category
            .write()
            .expect("rules lock poisoned")
            .insert((tenant_id, category), rule_set);
        self.bump_generation(tenant_id);
    }

    pub fn set_vendor(&self, tenant_id: TenantId, vendor_id: VendorId, rule_set: RuleSetOverride) {
        self.vendor
            .write()
            .expect("rules lock poisoned")
            .insert((tenant_id, vendor_id), rule_set);
        self.bump_generation(tenant_id);
    }

    pub fn set_amount_band(&self, tenant_id: TenantId, band_label: String, rule_set: RuleSetOverride) {
        self.amount_band
            .write()
            .expect("rules lock poisoned")
            .insert((tenant_id, band_label), rule_set);
        self.bump_generation(tenant_id);
    }

    pub fn resolve(
        &self,
        tenant_id: TenantId,
        vendor_id: VendorId,
        vendor_category: Option<&str>,
        amount: Money,
    ) -> RuleSet {
        let band = classify(amount, &self.bands);
        let band_label = band.map(|b| b.label.clone()).unwrap_or_default();
        let generation = self.current_generation(tenant_id);
        let cache_key = (tenant_id, vendor_id, band_label.clone());

        if let Some(entry) = self.cache.read().expect("rules lock poisoned").get(&cache_key) {
            if entry.computed_generation == generation && entry.expires_at > Instant::now() {
                return entry.rule_set;
            }
        }

        let mut resolved = RuleSet::built_in_default();
        if let Some(over) = self.global.read().expect("rules lock poisoned").get(&tenant_id) {
            resolved = over.apply_over(resolved);
        }
        if let Some(over) = self
            .amount_band
            .read()
            .expect("rules lock poisoned")
            .get(&(tenant_id, band_label.clone()))
        {
            resolved = over.apply_over(resolved);
        }
        if let Some(category) = vendor_category {
            if let Some(over) = self
                .vendor_category
                .read()
                .expect("rules lock poisoned")
                .get(&(tenant_id, category.to_string()))
            {
                resolved = over.apply_over(resolved);
            }
        }
        if let Some(over) = self.vendor.read().expect("rules lock poisoned").get(&(tenant_id, vendor_id)) {
            resolved = over.apply_over(resolved);
        }

        self.cache.write().expect("rules lock poisoned").insert(
            cache_key,
            CacheEntry {
                rule_set: resolved,
                computed_generation: generation,
                expires_at: Instant::now() + self.cache_ttl,
            },
        );

        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_to_built_in_default_with_no_overrides() {
        let resolver = RuleResolver::new(Duration::from_secs(60));
        let resolved = resolver.resolve(TenantId::new(), VendorId::new(), None, Money::parse("100.00").unwrap());
        assert_eq!(resolved, RuleSet::built_in_default());
    }

    #[test]
    fn vendor_specific_override_wins_over_global() {
        let resolver = RuleResolver::new(Duration::from_secs(60));
        let tenant = TenantId::new();
        let vendor = VendorId::new();

        resolver
            .set_global(
                tenant,
                RuleSetOverride {
                    date_tolerance_days: Some(3),
                    ..Default::default()
                },
            )
            .unwrap();
        resolver.set_vendor(
            tenant,
            vendor,
            RuleSetOverride {
                date_tolerance_days: Some(9),
                ..Default::default()
            },
        );

        let resolved = resolver.resolve(tenant, vendor, None, Money::parse("100.00").unwrap());
        assert_eq!(resolved.date_tolerance_days, 9);
    }

    #[test]
    fn editing_a_layer_invalidates_the_cache() {
        let resolver = RuleResolver::new(Duration::from_secs(60));
        let tenant = TenantId::new();
        let vendor = VendorId::new();
        let amount = Money::parse("100.00").unwrap();

        let first = resolver.resolve(tenant, vendor, None, amount);
        assert_eq!(first.date_tolerance_days, 5);

        resolver.set_vendor(
            tenant,
            vendor,
            RuleSetOverride {
                date_tolerance_days: Some(1),
                ..Default::default()
            },
        );

        let second = resolver.resolve(tenant, vendor, None, amount);
        assert_eq!(second.date_tolerance_days, 1);
    }
}
