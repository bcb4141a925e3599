//! config/app_config.rs
//! Configuración global del servicio (correo, base de datos, servidor).
//! Se lee de variables de entorno; `dotenv` ya cargó el `.env` en `main`.

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;

/// Parámetros SMTP para el aviso por correo.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender_email: String,
    pub sender_password: String,
    pub recipient_email: String,
    pub timeout_secs: u64,
}

impl MailConfig {
    /// Sin remitente o sin contraseña no intentamos enviar nada.
    pub fn is_configured(&self) -> bool {
        !self.sender_email.trim().is_empty()
            && !self.sender_password.is_empty()
            && !self.recipient_email.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mail: MailConfig,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    /// Zona horaria fija para `timestamp` y las estadísticas por día/semana/mes
    pub timezone: Tz,
    pub workers: Option<usize>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            mail: MailConfig {
                smtp_host: "smtp.163.com".to_string(),
                smtp_port: 587,
                sender_email: String::new(),
                sender_password: String::new(),
                recipient_email: String::new(),
                timeout_secs: 30,
            },
            database_path: "data/consultations.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 5002,
            debug: false,
            timezone: chrono_tz::Asia::Shanghai,
            workers: None,
        }
    }
}

impl AppConfig {
    /// Construye la config a partir del entorno, usando `Default` para lo que falte.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env` pero con una fuente de variables arbitraria (tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mail = MailConfig {
            smtp_host: get("SMTP_HOST").unwrap_or(defaults.mail.smtp_host),
            smtp_port: parse_or("SMTP_PORT", get("SMTP_PORT"), defaults.mail.smtp_port)?,
            sender_email: get("SENDER_EMAIL").unwrap_or_default(),
            sender_password: get("SENDER_PASSWORD").unwrap_or_default(),
            recipient_email: get("RECIPIENT_EMAIL").unwrap_or_default(),
            timeout_secs: parse_or(
                "MAIL_TIMEOUT_SECS",
                get("MAIL_TIMEOUT_SECS"),
                defaults.mail.timeout_secs,
            )?,
        };

        let timezone = match get("APP_TIMEZONE") {
            Some(raw) => raw
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow!("APP_TIMEZONE inválida '{}': {}", raw, e))?,
            None => defaults.timezone,
        };

        let workers = match get("APP_WORKERS") {
            Some(raw) => Some(parse_value::<usize>("APP_WORKERS", &raw)?),
            None => None,
        };

        Ok(AppConfig {
            mail,
            database_path: get("DATABASE_PATH").unwrap_or(defaults.database_path),
            host: get("APP_HOST").unwrap_or(defaults.host),
            port: parse_or("APP_PORT", get("APP_PORT"), defaults.port)?,
            debug: match get("APP_DEBUG") {
                Some(raw) => parse_flag("APP_DEBUG", &raw)?,
                None => defaults.debug,
            },
            timezone,
            workers,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Valor inválido para {}: '{}'", key, raw))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("Valor inválido para {}: '{}'", key, other)),
    }
}
