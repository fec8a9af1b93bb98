use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub auth_dev_mode: bool,
    pub categories_file: Option<String>,
    pub matchmaking_sweep_seconds: u64,
    pub invite_expiration_seconds: u64,
    pub connection_timeout_seconds: u64,
    pub match_start_delay_ms: u64,
    pub round_intro_delay_ms: u64,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("Invalid PORT"),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            auth_dev_mode: env::var("AUTH_DEV_MODE").unwrap_or_else(|_| "false".to_string())
                == "true",
            categories_file: env::var("CATEGORIES_FILE").ok(),
            matchmaking_sweep_seconds: env::var("MATCHMAKING_SWEEP_SECONDS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .expect("Invalid MATCHMAKING_SWEEP_SECONDS"),
            invite_expiration_seconds: env::var("INVITE_EXPIRATION_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("Invalid INVITE_EXPIRATION_SECONDS"),
            connection_timeout_seconds: env::var("CONNECTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("Invalid CONNECTION_TIMEOUT_SECONDS"),
            match_start_delay_ms: env::var("MATCH_START_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .expect("Invalid MATCH_START_DELAY_MS"),
            round_intro_delay_ms: env::var("ROUND_INTRO_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("Invalid ROUND_INTRO_DELAY_MS"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
