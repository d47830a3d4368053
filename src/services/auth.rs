use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{normalize_email, Role, User};
use crate::store;

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session_token: String,
    pub created: bool,
}

/// Display name derived from the mailbox part: `ada.lovelace@x` -> `Ada Lovelace`.
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    local
        .split('.')
        .filter(|part| !part.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

/// Find or create the user for an email, apply role promotion and roster
/// name sync, and open a new session.
pub fn login_or_register(conn: &Connection, config: &Config, email: &str) -> ServiceResult<LoginOutcome> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(ServiceError::validation("email is required"));
    }
    if !email.contains('@') {
        return Err(ServiceError::validation("email must contain '@'"));
    }
    let wants_instructor = config.is_instructor_email(&email);
    let roster_name = store::roster::find_active_by_email(conn, &email)?
        .map(|r| r.full_name())
        .filter(|n| !n.is_empty());

    let tx = conn.unchecked_transaction()?;
    let (mut user, created) = match store::users::get_by_email(&tx, &email)? {
        Some(user) => (user, false),
        None => {
            let role = if wants_instructor {
                Role::Instructor
            } else {
                Role::Student
            };
            let name = roster_name.clone().unwrap_or_else(|| name_from_email(&email));
            (store::users::create_user(&tx, &email, &name, role)?, true)
        }
    };

    if !created {
        if wants_instructor && user.role != Role::Instructor {
            store::users::set_role(&tx, user.id, Role::Instructor)?;
            user.role = Role::Instructor;
            info!(user_id = user.id, "promoted user to instructor");
        }
        if let Some(name) = roster_name {
            if name != user.name {
                store::users::set_name(&tx, user.id, &name)?;
                user.name = name;
            }
        }
    }

    let token = Uuid::new_v4().to_string();
    store::users::create_session(&tx, &token, user.id)?;
    tx.commit()?;

    info!(user_id = user.id, created, role = user.role.as_str(), "login");
    Ok(LoginOutcome {
        user,
        session_token: token,
        created,
    })
}

pub fn profile(conn: &Connection, session_token: &str) -> ServiceResult<User> {
    store::users::get_session_user(conn, session_token.trim())?
        .ok_or_else(|| ServiceError::not_found("session not found"))
}

pub fn logout(conn: &Connection, session_token: &str) -> ServiceResult<bool> {
    Ok(store::users::delete_session(conn, session_token.trim())?)
}

pub fn get_user(conn: &Connection, user_id: i64) -> ServiceResult<User> {
    store::users::get_by_id(conn, user_id)?
        .ok_or_else(|| ServiceError::not_found(format!("user {user_id} not found")))
}
