use serde::Serialize;
use tend_core::models::group_accounts;
use tend_core::util::normalize_text_option;
use tend_core::{AccountPatch, PasswordAccount, Record};

use crate::commands::common::{finish, pending_marker, resolve_record_id, short_id, Context};
use crate::error::CliError;

const PASSWORD_MASK: &str = "********";

#[derive(Debug, Serialize)]
pub struct AccountListItem {
    pub id: String,
    pub service: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub group: String,
    pub synced: bool,
}

impl AccountListItem {
    fn new(record: &Record<PasswordAccount>, reveal: bool) -> Self {
        Self {
            id: record.id.to_string(),
            service: record.fields.service.clone(),
            username: record.fields.username.clone(),
            password: reveal.then(|| record.fields.password.clone()),
            group: record.fields.group.clone(),
            synced: record.synced,
        }
    }
}

/// Render accounts under a header per group. Passwords are masked unless
/// `reveal` is set.
pub fn format_account_lines(records: &[Record<PasswordAccount>], reveal: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for (group, accounts) in group_accounts(records) {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push(format!("[{group}]"));
        for record in accounts {
            let password = if reveal {
                record.fields.password.as_str()
            } else {
                PASSWORD_MASK
            };
            lines.push(format!(
                "  {}  {}  {}  {}{}",
                short_id(&record.id),
                record.fields.service,
                record.fields.username,
                password,
                pending_marker(record.synced)
            ));
        }
    }
    lines
}

pub async fn run_add(
    context: &Context,
    service: &str,
    username: &str,
    password: &str,
    group: Option<String>,
) -> Result<(), CliError> {
    let mut account = PasswordAccount::new(service.trim(), username.trim(), password);
    if let Some(group) = normalize_text_option(group) {
        account = account.with_group(group);
    }

    let engine = context.engine::<PasswordAccount>().await?;
    let record = engine.add(account, None)?;
    finish(&engine).await;

    println!(
        "Stored {}: {} ({})",
        short_id(&record.id),
        record.fields.service,
        record.fields.group
    );
    Ok(())
}

pub async fn run_list(
    context: &Context,
    group: Option<&str>,
    reveal: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let engine = context.engine::<PasswordAccount>().await?;
    let records = engine
        .records()
        .into_iter()
        .filter(|record| {
            group.map_or(true, |group| record.fields.group.eq_ignore_ascii_case(group.trim()))
        })
        .collect::<Vec<_>>();
    finish(&engine).await;

    if as_json {
        let items = records
            .iter()
            .map(|record| AccountListItem::new(record, reveal))
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if records.is_empty() {
        println!("No accounts");
    } else {
        for line in format_account_lines(&records, reveal) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_update(context: &Context, id: &str, patch: AccountPatch) -> Result<(), CliError> {
    let patch = AccountPatch {
        service: normalize_text_option(patch.service),
        username: normalize_text_option(patch.username),
        group: normalize_text_option(patch.group),
        password: patch.password.filter(|password| !password.is_empty()),
    };
    if patch == AccountPatch::default() {
        return Err(CliError::EmptyPatch);
    }

    let engine = context.engine::<PasswordAccount>().await?;
    let id = resolve_record_id(&engine.records(), id)?;
    let record = engine.update(&id, patch)?;
    finish(&engine).await;

    println!("Updated {}: {}", short_id(&record.id), record.fields.service);
    Ok(())
}

pub async fn run_delete(context: &Context, id: &str) -> Result<(), CliError> {
    let engine = context.engine::<PasswordAccount>().await?;
    let id = resolve_record_id(&engine.records(), id)?;
    engine.delete(&id)?;
    finish(&engine).await;

    println!("Deleted {}", short_id(&id));
    Ok(())
}
