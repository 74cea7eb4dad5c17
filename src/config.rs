/// Configuration management for the Sabil registry
use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub registry_db: PathBuf,
    pub max_connections: u32,
}

/// How requests without a caller identity are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Every write needs an authenticated caller
    RoleAware,
    /// Legacy single-tenant deployment: the edit and read paths run without a session
    Open,
}

impl AuthMode {
    pub fn from_str(s: &str) -> RegistryResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "role-aware" | "role_aware" | "roleaware" => Ok(AuthMode::RoleAware),
            "open" => Ok(AuthMode::Open),
            _ => Err(RegistryError::Validation(format!("Invalid auth mode: {}", s))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::RoleAware => "role-aware",
            AuthMode::Open => "open",
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub mode: AuthMode,
    /// Admin account ensured at startup
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Credentials for the admin account created on first start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> RegistryResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("REGISTRY_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("REGISTRY_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| RegistryError::Validation("Invalid port number".to_string()))?;
        let version = env::var("REGISTRY_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("REGISTRY_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let registry_db = env::var("REGISTRY_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("registry.sqlite"));
        let max_connections = env::var("REGISTRY_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let jwt_secret = env::var("REGISTRY_JWT_SECRET")
            .map_err(|_| RegistryError::Validation("JWT secret required".to_string()))?;
        let session_ttl_hours = env::var("REGISTRY_SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "12".to_string())
            .parse()
            .unwrap_or(12);
        let mode = AuthMode::from_str(
            &env::var("REGISTRY_AUTH_MODE").unwrap_or_else(|_| "role-aware".to_string()),
        )?;

        let bootstrap_admin = match (
            env::var("REGISTRY_ADMIN_USERNAME").ok(),
            env::var("REGISTRY_ADMIN_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => {
                let email = env::var("REGISTRY_ADMIN_EMAIL")
                    .unwrap_or_else(|_| format!("{}@{}", username, "localhost.localdomain"));
                Some(BootstrapAdmin {
                    username,
                    password,
                    email,
                })
            }
            (None, None) => None,
            _ => {
                return Err(RegistryError::Validation(
                    "REGISTRY_ADMIN_USERNAME and REGISTRY_ADMIN_PASSWORD must be set together"
                        .to_string(),
                ))
            }
        };

        let rate_limit_enabled = env::var("REGISTRY_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let requests_per_second = env::var("REGISTRY_RATE_LIMIT_RPS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let burst_size = env::var("REGISTRY_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("REGISTRY_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                registry_db,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_hours,
                mode,
                bootstrap_admin,
            },
            rate_limit: RateLimitSettings {
                enabled: rate_limit_enabled,
                requests_per_second,
                burst_size,
            },
            logging: LoggingConfig {
                level: log_level,
                format: log_format,
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> RegistryResult<()> {
        if self.service.hostname.is_empty() {
            return Err(RegistryError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(RegistryError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_hours <= 0 {
            return Err(RegistryError::Validation(
                "Session TTL must be positive".to_string(),
            ));
        }

        if let Some(admin) = &self.authentication.bootstrap_admin {
            if admin.username.trim().is_empty() || admin.password.len() < 6 {
                return Err(RegistryError::Validation(
                    "Bootstrap admin needs a username and a password of at least 6 characters"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Configuration for tests: in-memory database, role-aware auth
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3000,
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                registry_db: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                session_ttl_hours: 12,
                mode: AuthMode::RoleAware,
                bootstrap_admin: None,
            },
            rate_limit: RateLimitSettings {
                enabled: false,
                requests_per_second: 100,
                burst_size: 50,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
