// src/recipients.rs
//! Recipient registry: E.164 phone normalization plus the active-subset
//! lookup the scheduler consumes at send time. Registration is driven by the
//! HTTP surface; the core only ever reads `list_active`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::OnceCell;
use tokio::fs;

use crate::errors::RegistrationError;
use crate::monitor::types::Recipient;

/// Read side consumed by the scheduler.
#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn list_active(&self) -> Vec<Recipient>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    /// Number existed but was inactive; reactivated with a fresh timestamp.
    Reactivated,
}

pub struct RecipientRegistry {
    inner: Mutex<BTreeMap<String, Recipient>>,
    path: Option<PathBuf>,
    default_country_code: String,
}

impl RecipientRegistry {
    /// Volatile registry (tests, demos).
    pub fn in_memory(default_country_code: &str) -> Self {
        Self {
            inner: Mutex::new(BTreeMap::new()),
            path: None,
            default_country_code: default_country_code.to_string(),
        }
    }

    /// File-backed registry. A missing or unreadable file starts empty; the
    /// file is rewritten atomically after every mutation.
    pub async fn load(path: PathBuf, default_country_code: &str) -> Self {
        let recipients: Vec<Recipient> = match fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "recipient file unreadable, starting empty");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        let map = recipients
            .into_iter()
            .map(|r| (r.phone.clone(), r))
            .collect();
        Self {
            inner: Mutex::new(map),
            path: Some(path),
            default_country_code: default_country_code.to_string(),
        }
    }

    /// Normalize to E.164. Bare 10-digit local numbers get the default
    /// country code prepended.
    pub fn normalize_phone(&self, raw: &str) -> Result<String, RegistrationError> {
        static RE_E164: OnceCell<regex::Regex> = OnceCell::new();
        static RE_LOCAL: OnceCell<regex::Regex> = OnceCell::new();
        let re_e164 = RE_E164.get_or_init(|| regex::Regex::new(r"^\+\d{10,15}$").unwrap());
        let re_local = RE_LOCAL.get_or_init(|| regex::Regex::new(r"^\d{10}$").unwrap());

        let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
        if re_e164.is_match(&cleaned) {
            return Ok(cleaned);
        }
        if re_local.is_match(&cleaned) {
            return Ok(format!("{}{cleaned}", self.default_country_code));
        }
        Err(RegistrationError::InvalidPhone(raw.to_string()))
    }

    pub async fn register(&self, raw: &str) -> Result<RegistrationOutcome, RegistrationError> {
        let phone = self.normalize_phone(raw)?;
        let outcome = {
            let mut map = self.inner.lock().expect("recipient registry mutex poisoned");
            match map.get_mut(&phone) {
                Some(existing) if existing.active => {
                    return Err(RegistrationError::AlreadyRegistered);
                }
                Some(existing) => {
                    existing.active = true;
                    existing.registered_at = Utc::now();
                    RegistrationOutcome::Reactivated
                }
                None => {
                    map.insert(
                        phone.clone(),
                        Recipient {
                            phone: phone.clone(),
                            registered_at: Utc::now(),
                            active: true,
                        },
                    );
                    RegistrationOutcome::Registered
                }
            }
        };
        self.persist().await?;
        tracing::info!(phone = %phone, ?outcome, "recipient registered");
        Ok(outcome)
    }

    pub async fn unregister(&self, raw: &str) -> Result<(), RegistrationError> {
        let phone = self.normalize_phone(raw)?;
        {
            let mut map = self.inner.lock().expect("recipient registry mutex poisoned");
            let Some(existing) = map.get_mut(&phone) else {
                return Err(RegistrationError::NotFound);
            };
            existing.active = false;
        }
        self.persist().await?;
        tracing::info!(phone = %phone, "recipient unregistered");
        Ok(())
    }

    pub fn active_count(&self) -> usize {
        self.inner
            .lock()
            .expect("recipient registry mutex poisoned")
            .values()
            .filter(|r| r.active)
            .count()
    }

    async fn persist(&self) -> Result<(), RegistrationError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let all: Vec<Recipient> = {
            let map = self.inner.lock().expect("recipient registry mutex poisoned");
            map.values().cloned().collect()
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(crate::errors::StoreError::from)?;
        }
        let bytes =
            serde_json::to_vec_pretty(&all).map_err(crate::errors::StoreError::from)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes)
            .await
            .map_err(crate::errors::StoreError::from)?;
        fs::rename(&tmp, path)
            .await
            .map_err(crate::errors::StoreError::from)?;
        Ok(())
    }
}

#[async_trait]
impl RecipientSource for RecipientRegistry {
    async fn list_active(&self) -> Vec<Recipient> {
        self.inner
            .lock()
            .expect("recipient registry mutex poisoned")
            .values()
            .filter(|r| r.active)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RecipientRegistry {
        RecipientRegistry::in_memory("+57")
    }

    #[test]
    fn e164_numbers_pass_through() {
        let r = registry();
        assert_eq!(r.normalize_phone("+573001234567").unwrap(), "+573001234567");
    }

    #[test]
    fn local_numbers_get_country_code() {
        let r = registry();
        assert_eq!(r.normalize_phone("3001234567").unwrap(), "+573001234567");
    }

    #[test]
    fn spaces_and_dashes_are_stripped() {
        let r = registry();
        assert_eq!(
            r.normalize_phone("+57 300 123-4567").unwrap(),
            "+573001234567"
        );
    }

    #[test]
    fn short_and_overlong_numbers_are_rejected() {
        let r = registry();
        assert!(r.normalize_phone("123").is_err());
        assert!(r.normalize_phone("+5730012345678901234").is_err());
    }

    #[tokio::test]
    async fn register_then_duplicate_then_reactivate() {
        let r = registry();
        assert_eq!(
            r.register("3001234567").await.unwrap(),
            RegistrationOutcome::Registered
        );
        assert!(matches!(
            r.register("+573001234567").await,
            Err(RegistrationError::AlreadyRegistered)
        ));

        r.unregister("3001234567").await.unwrap();
        assert_eq!(r.active_count(), 0);

        assert_eq!(
            r.register("3001234567").await.unwrap(),
            RegistrationOutcome::Reactivated
        );
        assert_eq!(r.active_count(), 1);
    }

    #[tokio::test]
    async fn unregister_unknown_number_is_an_error() {
        let r = registry();
        assert!(matches!(
            r.unregister("+573001234567").await,
            Err(RegistrationError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_active_skips_inactive() {
        let r = registry();
        r.register("3001234567").await.unwrap();
        r.register("3007654321").await.unwrap();
        r.unregister("3007654321").await.unwrap();

        let active = r.list_active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].phone, "+573001234567");
    }

    #[tokio::test]
    async fn file_backed_registry_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipients.json");

        let r = RecipientRegistry::load(path.clone(), "+57").await;
        r.register("3001234567").await.unwrap();
        drop(r);

        let r = RecipientRegistry::load(path, "+57").await;
        assert_eq!(r.active_count(), 1);
    }
}
