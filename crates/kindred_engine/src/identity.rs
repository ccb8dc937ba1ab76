//! Multi-format phone identity resolution.
//!
//! Historical records were stored under whatever format the signup path had
//! at the time: canonical 11-digit, raw as-received, pretty-printed locale
//! format, or bare 10-digit. The resolver normalizes the inbound sender and
//! walks the known formats in order instead of requiring a data migration.

use kindred_core::{EngineError, UserRecord};
use kindred_memory::UserStore;
use std::sync::Arc;

use crate::cache::SessionCache;

const COUNTRY_CODE: char = '1';

/// Normalize a raw sender into the canonical digit string.
///
/// Strips every non-digit, rejects anything shorter than 10 or longer than
/// 15 digits, and country-prefixes bare 10-digit numbers.
pub fn normalize(raw: &str) -> Result<String, EngineError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 || digits.len() > 15 {
        return Err(EngineError::InvalidIdentity(raw.to_string()));
    }
    if digits.len() == 10 {
        let mut canonical = String::with_capacity(11);
        canonical.push(COUNTRY_CODE);
        canonical.push_str(&digits);
        return Ok(canonical);
    }
    Ok(digits)
}

/// `(NNN) NNN-NNNN` built from the canonical key's last ten digits.
fn locale_format(canonical: &str) -> Option<String> {
    let digits: Vec<char> = canonical.chars().collect();
    if digits.len() < 10 {
        return None;
    }
    let last10 = &digits[digits.len() - 10..];
    let area: String = last10[..3].iter().collect();
    let mid: String = last10[3..6].iter().collect();
    let line: String = last10[6..].iter().collect();
    Some(format!("({}) {}-{}", area, mid, line))
}

pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn SessionCache>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<dyn SessionCache>) -> Self {
        Self { store, cache }
    }

    /// Resolve a raw sender to `(canonical_key, record)`.
    ///
    /// Cache hit on the canonical key wins. Otherwise the store is tried in
    /// order: canonical, raw original, locale-formatted, canonical minus
    /// the country digit. First hit repopulates the cache under the
    /// canonical key.
    pub async fn resolve(&self, raw: &str) -> Result<(String, UserRecord), EngineError> {
        let canonical = normalize(raw)?;

        if let Some(record) = self.cache.get(&canonical).await {
            return Ok((canonical, record));
        }

        let mut candidates: Vec<String> = vec![canonical.clone(), raw.to_string()];
        if let Some(pretty) = locale_format(&canonical) {
            candidates.push(pretty);
        }
        if canonical.len() == 11 {
            candidates.push(canonical[1..].to_string());
        }

        for key in candidates {
            if let Some(mut record) = self.store.get(&key).await? {
                record.identity = canonical.clone();
                if key != canonical {
                    // Lazy migration: rewrite under the canonical key so
                    // later merge-upserts have a home. The legacy copy is
                    // shadowed by lookup order from now on.
                    tracing::debug!(canonical = %canonical, stored_as = %key, "Migrating legacy-keyed record");
                    self.store.insert(&record).await?;
                }
                self.cache.put(&canonical, record.clone()).await;
                return Ok((canonical, record));
            }
        }

        Err(EngineError::UserNotFound(canonical))
    }
}
