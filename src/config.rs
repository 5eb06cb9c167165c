use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_url: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub redis_url: Option<String>,

    pub jwt_secret: String,
    /// Access token lifetime in minutes.
    pub jwt_maxage: i64,
    pub jwt_refresh_secret: String,
    /// Refresh token lifetime in minutes.
    pub jwt_refresh_maxage: i64,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_from: String,

    pub sms_api_url: String,
    pub sms_api_key: String,
    pub sms_sender: String,

    pub fcm_server_key: Option<String>,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET_KEY")?;
        let jwt_refresh_secret = required("JWT_REFRESH_SECRET_KEY")?;
        let jwt_maxage = parsed("JWT_MAXAGE", 60_i64)?;
        let jwt_refresh_maxage = parsed("JWT_REFRESH_MAXAGE", 60 * 24 * 30_i64)?;
        let app_url = optional("APP_URL").unwrap_or_else(|| "http://localhost:5173".to_string());

        let cors_origins = optional("CORS_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec![app_url.clone()]);

        // Email service configurations (with defaults)
        let smtp_host = optional("SMTP_HOST").unwrap_or_else(|| "localhost".to_string());
        let smtp_port = parsed("SMTP_PORT", 587_u16)?;
        let smtp_username = optional("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = optional("SMTP_PASSWORD").unwrap_or_default();
        let smtp_from = optional("SMTP_FROM")
            .unwrap_or_else(|| "Haulway <noreply@haulway.pk>".to_string());

        let sms_api_url = optional("SMS_API_URL").unwrap_or_default();
        let sms_api_key = optional("SMS_API_KEY").unwrap_or_default();
        let sms_sender = optional("SMS_SENDER").unwrap_or_else(|| "Haulway".to_string());

        Ok(Config {
            database_url,
            app_url,
            port: parsed("PORT", 8000_u16)?,
            cors_origins,
            redis_url: optional("REDIS_URL"),
            jwt_secret,
            jwt_maxage,
            jwt_refresh_secret,
            jwt_refresh_maxage,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            smtp_from,
            sms_api_url,
            sms_api_key,
            sms_sender,
            fcm_server_key: optional("FCM_SERVER_KEY"),
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Config {
        Config {
            database_url: "postgres://localhost/haulway_test".to_string(),
            app_url: "http://localhost:5173".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:5173".to_string()],
            redis_url: None,
            jwt_secret: "access-secret".to_string(),
            jwt_maxage: 60,
            jwt_refresh_secret: "refresh-secret".to_string(),
            jwt_refresh_maxage: 600,
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_from: "Haulway <noreply@haulway.pk>".to_string(),
            sms_api_url: String::new(),
            sms_api_key: String::new(),
            sms_sender: "Haulway".to_string(),
            fcm_server_key: None,
        }
    }
}
