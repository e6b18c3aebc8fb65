//! Password vault account model

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::{CollectionItem, Record};
use crate::error::{Error, Result};

/// Group assigned to accounts created without one.
pub const DEFAULT_ACCOUNT_GROUP: &str = "General";

fn default_group() -> String {
    DEFAULT_ACCOUNT_GROUP.to_string()
}

/// Credentials for a single service kept in the vault.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordAccount {
    pub service: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_group")]
    pub group: String,
}

impl PasswordAccount {
    pub fn new(
        service: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            username: username.into(),
            password: password.into(),
            group: default_group(),
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
}

impl fmt::Debug for PasswordAccount {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PasswordAccount")
            .field("service", &self.service)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("group", &self.group)
            .finish()
    }
}

/// Partial update for a vault account.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl fmt::Debug for AccountPatch {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AccountPatch")
            .field("service", &self.service)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("group", &self.group)
            .finish()
    }
}

impl CollectionItem for PasswordAccount {
    type Patch = AccountPatch;

    const STORAGE_KEY: &'static str = "password_accounts";
    const REMOTE_PATH: &'static str = "accounts";
    const LABEL: &'static str = "accounts";

    fn apply_patch(&mut self, patch: &AccountPatch) {
        if let Some(service) = &patch.service {
            self.service.clone_from(service);
        }
        if let Some(username) = &patch.username {
            self.username.clone_from(username);
        }
        if let Some(password) = &patch.password {
            self.password.clone_from(password);
        }
        if let Some(group) = &patch.group {
            self.group.clone_from(group);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(Error::InvalidInput("Service name cannot be empty".into()));
        }
        if self.group.trim().is_empty() {
            return Err(Error::InvalidInput("Account group cannot be empty".into()));
        }
        Ok(())
    }
}

/// Group vault accounts by their group, services sorted case-insensitively.
pub fn group_accounts(
    records: &[Record<PasswordAccount>],
) -> BTreeMap<String, Vec<&Record<PasswordAccount>>> {
    let mut groups: BTreeMap<String, Vec<&Record<PasswordAccount>>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.fields.group.clone())
            .or_default()
            .push(record);
    }
    for accounts in groups.values_mut() {
        accounts.sort_by_key(|record| record.fields.service.to_lowercase());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_debug_redacts_password() {
        let account = PasswordAccount::new("mail", "me@example.com", "hunter2");
        let debug = format!("{account:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));

        let patch = AccountPatch {
            password: Some("hunter3".to_string()),
            ..Default::default()
        };
        assert!(!format!("{patch:?}").contains("hunter3"));
    }

    #[test]
    fn test_missing_group_uses_default() {
        let parsed: PasswordAccount =
            serde_json::from_str(r#"{"service":"bank","username":"u","password":"p"}"#).unwrap();
        assert_eq!(parsed.group, DEFAULT_ACCOUNT_GROUP);
    }

    #[test]
    fn test_group_accounts_sorts_services() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let records = vec![
            Record::new(
                PasswordAccount::new("zeta", "u", "p").with_group("Work"),
                date,
            ),
            Record::new(PasswordAccount::new("Alpha", "u", "p").with_group("Work"), date),
            Record::new(PasswordAccount::new("bank", "u", "p"), date),
        ];

        let groups = group_accounts(&records);
        assert_eq!(groups.len(), 2);
        let work: Vec<&str> = groups["Work"]
            .iter()
            .map(|record| record.fields.service.as_str())
            .collect();
        assert_eq!(work, vec!["Alpha", "zeta"]);
        assert_eq!(groups[DEFAULT_ACCOUNT_GROUP].len(), 1);
    }
}
