//! Per-user resource accounting
//!
//! Accounts are persisted as `.toml` documents, one per user, under the
//! ledger root. Usage commits go through a single increment primitive; the
//! check/commit pair around a pipeline run is advisory, not transactional:
//! two concurrent requests can both pass `check_quota` before either
//! commits, allowing a transient overrun past the nominal limit.

use loft_core::{now_iso8601, LoftError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const DEFAULT_IMAGES_QUOTA: u32 = 200;
const DEFAULT_MODELS_QUOTA: u32 = 100;

/// The consumable resource kinds tracked per account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Model,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::Model => write!(f, "3D model"),
        }
    }
}

/// A user account with quotas and usage counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: String,
    pub images_quota: u32,
    pub images_used: u32,
    pub models_quota: u32,
    pub models_used: u32,
    /// ISO 8601 timestamp of account creation
    pub created_at: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl Account {
    fn new(user_id: &str, email: Option<String>, is_anonymous: bool) -> Self {
        Self {
            user_id: user_id.to_string(),
            images_quota: DEFAULT_IMAGES_QUOTA,
            images_used: 0,
            models_quota: DEFAULT_MODELS_QUOTA,
            models_used: 0,
            created_at: now_iso8601(),
            email,
            is_anonymous,
        }
    }

    /// Remaining count for a resource; negative after an overrun commit
    pub fn remaining(&self, kind: ResourceKind) -> i64 {
        match kind {
            ResourceKind::Image => self.images_quota as i64 - self.images_used as i64,
            ResourceKind::Model => self.models_quota as i64 - self.models_used as i64,
        }
    }
}

/// Quota summary returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaInfo {
    pub images_quota: u32,
    pub models_quota: u32,
    pub images_used: u32,
    pub models_used: u32,
    pub images_remaining: i64,
    pub models_remaining: i64,
}

/// Document-backed quota ledger.
///
/// The only component that mutates account counters. Increments are
/// serialized behind an internal lock so a commit is a single atomic
/// primitive rather than a caller-side read-then-write.
pub struct QuotaLedger {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl QuotaLedger {
    /// Create a ledger over the given accounts root directory
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Ensure an account document exists, creating it with default quotas.
    ///
    /// Idempotent under sequential calls. Two concurrent first calls may
    /// both write; the defaults are identical either way, so last write
    /// wins harmlessly.
    pub fn ensure_account(
        &self,
        user_id: &str,
        email: Option<&str>,
        is_anonymous: bool,
    ) -> Result<Account> {
        if let Some(existing) = self.try_load(user_id)? {
            return Ok(existing);
        }

        let account = Account::new(user_id, email.map(|e| e.to_string()), is_anonymous);
        self.save(&account)?;
        Ok(account)
    }

    /// Remaining quota for `kind`. Performs no mutation.
    ///
    /// Fails `NotFound` if the account does not exist and `QuotaExceeded`
    /// once nothing remains.
    pub fn check_quota(&self, user_id: &str, kind: ResourceKind) -> Result<i64> {
        let account = self.load(user_id)?;
        let remaining = account.remaining(kind);
        if remaining <= 0 {
            return Err(LoftError::QuotaExceeded(kind.to_string()));
        }
        Ok(remaining)
    }

    /// Unconditionally increment usage of `kind` by `count`.
    ///
    /// Never fails on "exceeded": once a pipeline has consumed provider
    /// capacity the usage is recorded as-is. Never retried by callers: an
    /// ambiguous failure must not become a double count.
    pub fn commit_usage(&self, user_id: &str, kind: ResourceKind, count: u32) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| LoftError::Storage("Ledger lock poisoned".to_string()))?;

        let mut account = self.load(user_id)?;
        match kind {
            ResourceKind::Image => account.images_used += count,
            ResourceKind::Model => account.models_used += count,
        }
        self.save(&account)
    }

    /// Quota summary for both resource kinds
    pub fn quota_info(&self, user_id: &str) -> Result<QuotaInfo> {
        let account = self.load(user_id)?;
        Ok(QuotaInfo {
            images_quota: account.images_quota,
            models_quota: account.models_quota,
            images_used: account.images_used,
            models_used: account.models_used,
            images_remaining: account.remaining(ResourceKind::Image),
            models_remaining: account.remaining(ResourceKind::Model),
        })
    }

    /// Load an account, failing `NotFound` if absent
    pub fn load(&self, user_id: &str) -> Result<Account> {
        self.try_load(user_id)?
            .ok_or_else(|| LoftError::NotFound(format!("Account not found: {}", user_id)))
    }

    fn try_load(&self, user_id: &str) -> Result<Option<Account>> {
        let path = self.account_path(user_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let file: AccountFile = toml::from_str(&content)?;
        Ok(Some(file.account))
    }

    fn save(&self, account: &Account) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let wrapper = AccountFile {
            account: account.clone(),
        };
        let content = toml::to_string_pretty(&wrapper)?;
        std::fs::write(self.account_path(&account.user_id), content)?;
        Ok(())
    }

    fn account_path(&self, user_id: &str) -> PathBuf {
        self.root.join(format!("{}.toml", user_id))
    }
}

#[derive(Serialize, Deserialize)]
struct AccountFile {
    account: Account,
}
