/// Login accounts, their sessions and the bearer tokens that name them
///
/// Tokens are HS256 JWTs whose `sid` claim must match a live row in
/// `sessions`; disabling or deleting an account revokes its sessions.

use crate::{
    account::{password, Caller, CreateAccountRequest, Role},
    config::{BootstrapAdmin, ServerConfig},
    db::{self, account::{Account, AccountView, Session}},
    error::{RegistryError, RegistryResult},
    registry::policy::{self, AdminAction},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

const ACCOUNT_COLUMNS: &str =
    "id, username, email, password_hash, role, display_name, is_active, created_at, updated_at";

/// Access token claims
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    sid: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// Session joined with its account, as read during token validation
#[derive(Debug, FromRow)]
struct SessionAccountRow {
    session_id: String,
    expires_at: DateTime<Utc>,
    account_id: String,
    username: String,
    display_name: Option<String>,
    role: String,
    is_active: bool,
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Create a `user`-role account (admin only)
    pub async fn create_account(
        &self,
        actor: Option<&Caller>,
        req: CreateAccountRequest,
    ) -> RegistryResult<AccountView> {
        policy::authorize_admin_action(actor, AdminAction::CreateAccount)?;

        req.validate()?;
        validate_email_domain(&req.email)?;

        let account = self
            .insert_account(&req.username, &req.email, &req.password, Role::User, req.display_name)
            .await?;

        info!(
            username = %account.username,
            created_by = actor.map(|a| a.username.as_str()).unwrap_or("anonymous"),
            "Created account"
        );

        Ok(account.into())
    }

    /// Create the configured bootstrap admin when no account holds its username.
    /// Returns true when a row was written.
    pub async fn ensure_bootstrap_admin(&self, admin: &BootstrapAdmin) -> RegistryResult<bool> {
        if self.find_by_username(&admin.username).await?.is_some() {
            debug!(username = %admin.username, "Bootstrap admin already present");
            return Ok(false);
        }

        self.insert_account(&admin.username, &admin.email, &admin.password, Role::Admin, None)
            .await?;
        info!(username = %admin.username, "Created bootstrap admin account");

        Ok(true)
    }

    async fn insert_account(
        &self,
        username: &str,
        email: &str,
        plain_password: &str,
        role: Role,
        display_name: Option<String>,
    ) -> RegistryResult<Account> {
        let username = username.trim().to_string();
        let email = email.trim().to_lowercase();

        if self.username_or_email_exists(&username, &email).await? {
            return Err(RegistryError::Validation(
                "Username or email already exists".to_string(),
            ));
        }

        let password_hash = password::hash_password(plain_password)?;
        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            username,
            email,
            password_hash,
            role: role.as_str().to_string(),
            display_name: display_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO accounts (id, username, email, password_hash, role, display_name, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(&account.role)
        .bind(&account.display_name)
        .bind(account.is_active)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RegistryError::Validation("Username or email already exists".to_string())
            }
            _ => RegistryError::Database(e),
        })?;

        Ok(account)
    }

    /// Authenticate account and create session
    pub async fn login(&self, username: &str, plain_password: &str) -> RegistryResult<(Account, Session)> {
        let account = self
            .find_by_username(username.trim())
            .await?
            .ok_or_else(|| RegistryError::Unauthorized("Invalid username or password".to_string()))?;

        if !password::verify_password(plain_password, &account.password_hash)? {
            warn!(username = %account.username, "Failed login attempt");
            return Err(RegistryError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }

        if !account.is_active {
            return Err(RegistryError::Forbidden(
                "Your account has been disabled. Please contact the administrator.".to_string(),
            ));
        }

        let session = self.create_session(&account).await?;
        info!(username = %account.username, "Login succeeded");

        Ok((account, session))
    }

    /// Create a session for an account
    pub async fn create_session(&self, account: &Account) -> RegistryResult<Session> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.config.authentication.session_ttl_hours);

        let access_token = self.generate_access_token(account, &session_id, now, expires_at)?;

        sqlx::query(
            "INSERT INTO sessions (id, account_id, access_token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&session_id)
        .bind(&account.id)
        .bind(&access_token)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(Session {
            id: session_id,
            account_id: account.id.clone(),
            access_token,
            created_at: now,
            expires_at,
        })
    }

    /// Validate access token and resolve the caller behind it
    pub async fn validate_access_token(&self, token: &str) -> RegistryResult<Caller> {
        let claims = self.decode_access_token(token)?;

        let row = sqlx::query_as::<_, SessionAccountRow>(
            "SELECT s.id AS session_id, s.expires_at, a.id AS account_id, a.username,
                    a.display_name, a.role, a.is_active
             FROM sessions s
             JOIN accounts a ON a.id = s.account_id
             WHERE s.access_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| RegistryError::Unauthorized("Invalid or expired session".to_string()))?;

        if row.session_id != claims.sid || row.account_id != claims.sub {
            return Err(RegistryError::Unauthorized("Invalid or expired session".to_string()));
        }

        if Utc::now() > row.expires_at {
            return Err(RegistryError::Unauthorized("Session expired".to_string()));
        }

        if !row.is_active {
            return Err(RegistryError::Unauthorized("Account is disabled".to_string()));
        }

        Ok(Caller {
            account_id: row.account_id,
            username: row.username,
            display_name: row.display_name,
            role: Role::from_str(&row.role)?,
            session_id: row.session_id,
        })
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, session_id: &str) -> RegistryResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Get account by id
    pub async fn get_account(&self, account_id: &str) -> RegistryResult<Account> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE id = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| RegistryError::NotFound("Account not found".to_string()))
    }

    async fn find_by_username(&self, username: &str) -> RegistryResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts WHERE username = ?1",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(account)
    }

    async fn username_or_email_exists(&self, username: &str, email: &str) -> RegistryResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts WHERE username = ?1 OR email = ?2")
                .bind(username)
                .bind(email)
                .fetch_one(&self.db)
                .await?;

        Ok(count > 0)
    }

    /// All accounts, newest first (admin only)
    pub async fn list_accounts(&self, actor: Option<&Caller>) -> RegistryResult<Vec<AccountView>> {
        policy::authorize_admin_action(actor, AdminAction::ListAccounts)?;

        let accounts = sqlx::query_as::<_, Account>(&format!(
            "SELECT {} FROM accounts ORDER BY created_at DESC, username ASC",
            ACCOUNT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(accounts.into_iter().map(AccountView::from).collect())
    }

    /// Enable or disable an account. Disabling revokes its sessions.
    pub async fn set_active(
        &self,
        actor: Option<&Caller>,
        target_account_id: &str,
        is_active: bool,
    ) -> RegistryResult<AccountView> {
        policy::authorize_admin_action(actor, AdminAction::SetAccountActive { target_account_id })?;

        let mut tx = db::begin_write(&self.db).await?;
        let result = sqlx::query("UPDATE accounts SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(is_active)
            .bind(Utc::now())
            .bind(target_account_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound("Account not found".to_string()));
        }

        if !is_active {
            let revoked = sqlx::query("DELETE FROM sessions WHERE account_id = ?1")
                .bind(target_account_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            debug!(account_id = target_account_id, revoked, "Revoked sessions of disabled account");
        }
        tx.commit().await?;

        info!(account_id = target_account_id, is_active, "Account status changed");
        Ok(self.get_account(target_account_id).await?.into())
    }

    /// Hard-delete an account; its sessions go with it
    pub async fn delete_account(&self, actor: Option<&Caller>, target_account_id: &str) -> RegistryResult<()> {
        policy::authorize_admin_action(actor, AdminAction::DeleteAccount { target_account_id })?;

        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1")
            .bind(target_account_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound("Account not found".to_string()));
        }

        info!(account_id = target_account_id, "Deleted account");
        Ok(())
    }

    fn generate_access_token(
        &self,
        account: &Account,
        session_id: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> RegistryResult<String> {
        let claims = Claims {
            sub: account.id.clone(),
            sid: session_id.to_string(),
            role: account.role.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| RegistryError::Jwt(format!("Failed to generate token: {}", e)))
    }

    fn decode_access_token(&self, token: &str) -> RegistryResult<Claims> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "Rejected access token");
            RegistryError::Unauthorized("Invalid or expired session".to_string())
        })
    }

    /// Cleanup expired sessions
    ///
    /// Called hourly by the background job runner.
    pub async fn cleanup_expired_sessions(&self) -> RegistryResult<u64> {
        let sessions_deleted = sqlx::query("DELETE FROM sessions WHERE expires_at < ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?
            .rows_affected();

        if sessions_deleted > 0 {
            info!(sessions_deleted, "Cleaned up expired sessions");
        } else {
            debug!("Session cleanup: no expired sessions found");
        }

        Ok(sessions_deleted)
    }
}

/// `validator` accepts single-label domains; accounts need a dotted one
fn validate_email_domain(email: &str) -> RegistryResult<()> {
    let dotted = email
        .rsplit_once('@')
        .map(|(_, domain)| domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'))
        .unwrap_or(false);

    if !dotted {
        return Err(RegistryError::Validation("Invalid email format".to_string()));
    }

    Ok(())
}
