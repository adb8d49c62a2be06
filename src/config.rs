use std::env;

use crate::error::AppError;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Runtime settings, read from the process environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: Option<String>,
    pub max_connections: u32,
    pub seed_rng: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL must be set".to_string()))?;

        Ok(Self {
            database_url,
            port: parse_var("PORT")?.unwrap_or(DEFAULT_PORT),
            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            seed_rng: parse_var("SEED_RNG")?,
        })
    }

    pub fn jwt_secret(&self) -> Result<&str, AppError> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| AppError::Config("JWT_SECRET must be set".to_string()))
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, AppError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {:?}", name, raw))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: Option<&str>) -> Config {
        Config {
            database_url: "postgres://localhost/stockmaster".to_string(),
            port: 8080,
            jwt_secret: secret.map(str::to_string),
            max_connections: 5,
            seed_rng: None,
        }
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        assert!(matches!(config(None).jwt_secret(), Err(AppError::Config(_))));
        assert_eq!(config(Some("s3cret")).jwt_secret().unwrap(), "s3cret");
    }

    #[test]
    fn binds_on_all_interfaces() {
        assert_eq!(config(None).bind_address(), "0.0.0.0:8080");
    }
}
