use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use tracing::{info, warn};

pub mod cors;
pub mod mail;
pub mod security;

pub use cors::create_cors_layer;
pub use mail::{MailTemplate, MailTemplates, TemplateVariants};
pub use security::create_security_header_layers;

use crate::calendar::CalendarSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid mail templates in {path}: {source}")]
    Templates {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub store: StoreKind,
    pub port: u16,
    /// Enables HSTS and real mail delivery.
    pub production: bool,
    pub mail_from: String,
    pub mail_templates: Option<PathBuf>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub image_folder: PathBuf,
    pub calendar_domain: String,
    pub dispatch_attempts: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/evendemy".to_string()),
            store: parse_var("EVENDEMY_STORE", StoreKind::Postgres),
            port: parse_var("EVENDEMY_PORT", 3001),
            production: is_production(),
            mail_from: env::var("EVENDEMY_MAIL_FROM")
                .unwrap_or_else(|_| "evendemy@localhost".to_string()),
            mail_templates: env::var("EVENDEMY_MAIL_TEMPLATES").ok().map(PathBuf::from),
            smtp_host: env::var("EVENDEMY_SMTP_HOST").ok().filter(|h| !h.is_empty()),
            smtp_port: parse_var("EVENDEMY_SMTP_PORT", 25),
            image_folder: env::var("EVENDEMY_IMAGE_FOLDER")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("images")),
            calendar_domain: env::var("EVENDEMY_CALENDAR_DOMAIN")
                .unwrap_or_else(|_| "evendemy.local".to_string()),
            dispatch_attempts: parse_var("EVENDEMY_DISPATCH_ATTEMPTS", 3).max(1),
        }
    }

    pub fn calendar_settings(&self) -> CalendarSettings {
        CalendarSettings {
            domain: self.calendar_domain.clone(),
            organizer: self.mail_from.clone(),
        }
    }

    pub fn load_mail_templates(&self) -> Result<MailTemplates, ConfigError> {
        match &self.mail_templates {
            Some(path) => {
                info!(path = %path.display(), "Loading mail templates");
                MailTemplates::from_file(path)
            }
            None => Ok(MailTemplates::default()),
        }
    }
}

pub(crate) fn is_production() -> bool {
    env::var("RUST_ENV")
        .map(|v| v.to_lowercase() == "production")
        .unwrap_or(false)
}

fn parse_var<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

impl Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Postgres => f.write_str("postgres"),
            StoreKind::Memory => f.write_str("memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_on_invalid_value() {
        std::env::set_var("EVENDEMY_TEST_PORT", "not-a-port");
        assert_eq!(parse_var::<u16>("EVENDEMY_TEST_PORT", 3001), 3001);

        std::env::set_var("EVENDEMY_TEST_PORT", "8080");
        assert_eq!(parse_var::<u16>("EVENDEMY_TEST_PORT", 3001), 8080);
        std::env::remove_var("EVENDEMY_TEST_PORT");
    }

    #[test]
    fn test_store_kind_parsing() {
        assert_eq!("memory".parse::<StoreKind>(), Ok(StoreKind::Memory));
        assert_eq!("PG".parse::<StoreKind>(), Ok(StoreKind::Postgres));
        assert!("redis".parse::<StoreKind>().is_err());
    }
}
