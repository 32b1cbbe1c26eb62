use std::env;
use std::time::Duration;

/// Settings owned by the token/auth services.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub auth_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub action_token_lifetime: Duration,
    pub change_password_token_lifetime: Duration,
    pub invite_token_lifetime: Duration,
    /// Validity of a verification code sent to the user's phone.
    pub auth_code_lifetime: Duration,
    pub max_code_attempts: u32,
    pub max_login_attempts: u32,
    pub lock_duration: Duration,
    pub bcrypt_cost: u32,
}

impl AuthConfig {
    /// Defaults for everything except the signing secret.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            auth_token_lifetime: Duration::from_secs(2 * 3600),
            refresh_token_lifetime: Duration::from_secs(6 * 3600),
            action_token_lifetime: Duration::from_secs(3600),
            change_password_token_lifetime: Duration::from_secs(48 * 3600),
            invite_token_lifetime: Duration::from_secs(48 * 3600),
            auth_code_lifetime: Duration::from_secs(15 * 60),
            max_code_attempts: 3,
            max_login_attempts: 5,
            lock_duration: Duration::from_secs(3600),
            bcrypt_cost: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL; in-memory stores are used when unset.
    pub database_url: Option<String>,
    pub auth: AuthConfig,
    pub frontend_url: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = AuthConfig::with_secret(required("BACKEND_SECRET")?);
        let auth = AuthConfig {
            auth_token_lifetime: duration("AUTH_TOKEN_LIFETIME", defaults.auth_token_lifetime)?,
            refresh_token_lifetime: duration(
                "REFRESH_TOKEN_LIFETIME",
                defaults.refresh_token_lifetime,
            )?,
            action_token_lifetime: duration(
                "ACTION_TOKEN_LIFETIME",
                defaults.action_token_lifetime,
            )?,
            change_password_token_lifetime: duration(
                "CHANGE_PASSWORD_TOKEN_LIFETIME",
                defaults.change_password_token_lifetime,
            )?,
            invite_token_lifetime: duration(
                "INVITE_TOKEN_LIFETIME",
                defaults.invite_token_lifetime,
            )?,
            auth_code_lifetime: duration("AUTH_CODE_LIFETIME", defaults.auth_code_lifetime)?,
            max_code_attempts: env::var("MAX_CODE_ATTEMPTS")
                .unwrap_or_else(|_| "3".into())
                .parse()?,
            max_login_attempts: env::var("MAX_LOGIN_ATTEMPTS")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
            lock_duration: duration("LOCK_TIME", defaults.lock_duration)?,
            bcrypt_cost: env::var("SALT_WORK_FACTOR")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            ..defaults
        };

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            auth,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:4200".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Missing required env var: {}", key))
}

/// Reads a human-readable duration such as `2h` or `48h`.
fn duration(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => humantime::parse_duration(&v)
            .map_err(|e| anyhow::anyhow!("Invalid duration in {}: {}", key, e)),
        _ => Ok(default),
    }
}
