use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub db_max_connections: u32,
    /// `*` allows any origin.
    pub cors_origin: String,
    pub default_primary_clinic: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let session_ttl_hours = parse_or("SESSION_TTL_HOURS", 24);
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 10);
        let cors_origin = env::var("CORS_ORIGIN").unwrap_or_else(|_| "*".to_string());
        let default_primary_clinic =
            env::var("DEFAULT_PRIMARY_CLINIC").unwrap_or_else(|_| "PRED CLINIC".to_string());

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            db_max_connections,
            cors_origin,
            default_primary_clinic,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}
