//! User commands: register, login, users, reset.

use std::io::Write;

use tracing::info;

use super::AppState;
use crate::db::UserRepository;
use crate::{GatorError, Result};

pub(super) async fn register<W: Write>(state: &mut AppState, name: &str, out: &mut W) -> Result<()> {
    let user = UserRepository::new(state.db.pool()).create(name).await?;
    state.persist_current_user(&user.name)?;

    info!("Registered user {} (id {})", user.name, user.id);
    writeln!(out, "User {} created and logged in", user.name)?;
    Ok(())
}

pub(super) async fn login<W: Write>(state: &mut AppState, name: &str, out: &mut W) -> Result<()> {
    let user = UserRepository::new(state.db.pool())
        .get_by_name(name)
        .await?
        .ok_or_else(|| GatorError::NotFound(format!("user {name}")))?;
    state.persist_current_user(&user.name)?;

    writeln!(out, "Logged in as {}", user.name)?;
    Ok(())
}

pub(super) async fn list<W: Write>(state: &AppState, out: &mut W) -> Result<()> {
    let users = UserRepository::new(state.db.pool()).list().await?;
    let current = state.config.current_user();

    for user in users {
        if Some(user.name.as_str()) == current {
            writeln!(out, "* {} (current)", user.name)?;
        } else {
            writeln!(out, "* {}", user.name)?;
        }
    }
    Ok(())
}

pub(super) async fn reset<W: Write>(state: &AppState, out: &mut W) -> Result<()> {
    let removed = UserRepository::new(state.db.pool()).delete_all().await?;

    info!("Reset database: removed {} user(s)", removed);
    writeln!(out, "Database reset")?;
    Ok(())
}
