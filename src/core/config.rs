use std::env;

use crate::shared::constants::{
    DEFAULT_DROP_EDGE_ZONE, DEFAULT_ORDER_KEY_MIN_GAP, DEFAULT_ORDER_KEY_STEP,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub swagger: SwaggerConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// Tuning for the category organizer (ordering keys and drop zones)
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    /// Spacing between consecutive sibling keys, also the base key of an empty group
    pub order_key_step: f64,
    /// Smallest gap allowed between adjacent sibling keys before a rebalance
    pub order_key_min_gap: f64,
    /// Height of the ABOVE and BELOW zones as a fraction of the row height
    pub drop_edge_zone: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            catalog: CatalogConfig::from_env()?,
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        let max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MAX_CONNECTIONS must be a valid number".to_string())?;

        let min_connections = env::var("DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| Self::DEFAULT_MIN_CONNECTIONS.to_string())
            .parse::<u32>()
            .map_err(|_| "DB_MIN_CONNECTIONS must be a valid number".to_string())?;

        let acquire_timeout_secs = env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_ACQUIRE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_ACQUIRE_TIMEOUT_SECS must be a valid number".to_string())?;

        let idle_timeout_secs = env::var("DB_IDLE_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_IDLE_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_IDLE_TIMEOUT_SECS must be a valid number".to_string())?;

        let max_lifetime_secs = env::var("DB_MAX_LIFETIME_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_LIFETIME_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "DB_MAX_LIFETIME_SECS must be a valid number".to_string())?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
            max_lifetime_secs,
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title =
            env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Storefront Catalog API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Category organizer API for storefront dashboards".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            order_key_step: DEFAULT_ORDER_KEY_STEP,
            order_key_min_gap: DEFAULT_ORDER_KEY_MIN_GAP,
            drop_edge_zone: DEFAULT_DROP_EDGE_ZONE,
        }
    }
}

impl CatalogConfig {
    pub fn from_env() -> Result<Self, String> {
        let order_key_step = env::var("CATEGORY_ORDER_KEY_STEP")
            .unwrap_or_else(|_| DEFAULT_ORDER_KEY_STEP.to_string())
            .parse::<f64>()
            .map_err(|_| "CATEGORY_ORDER_KEY_STEP must be a valid number".to_string())?;

        let order_key_min_gap = env::var("CATEGORY_ORDER_KEY_MIN_GAP")
            .unwrap_or_else(|_| DEFAULT_ORDER_KEY_MIN_GAP.to_string())
            .parse::<f64>()
            .map_err(|_| "CATEGORY_ORDER_KEY_MIN_GAP must be a valid number".to_string())?;

        let drop_edge_zone = env::var("CATEGORY_DROP_EDGE_ZONE")
            .unwrap_or_else(|_| DEFAULT_DROP_EDGE_ZONE.to_string())
            .parse::<f64>()
            .map_err(|_| "CATEGORY_DROP_EDGE_ZONE must be a valid number".to_string())?;

        let config = Self {
            order_key_step,
            order_key_min_gap,
            drop_edge_zone,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.order_key_step.is_finite() && self.order_key_step > 0.0) {
            return Err("CATEGORY_ORDER_KEY_STEP must be a positive number".to_string());
        }
        if !(self.order_key_min_gap.is_finite()
            && self.order_key_min_gap > 0.0
            && self.order_key_min_gap < self.order_key_step)
        {
            return Err(
                "CATEGORY_ORDER_KEY_MIN_GAP must be positive and smaller than the step".to_string(),
            );
        }
        if !(self.drop_edge_zone > 0.0 && self.drop_edge_zone < 0.5) {
            return Err("CATEGORY_DROP_EDGE_ZONE must be between 0 and 0.5 (exclusive)".to_string());
        }
        Ok(())
    }
}
