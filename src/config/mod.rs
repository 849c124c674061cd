use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub max_search_radius_km: f64,
    pub default_community_radius_km: f64,
    pub analysis_api_url: Option<String>,
    pub analysis_api_key: Option<String>,
    pub analysis_model: String,
    pub analysis_confidence_threshold: f64,
    pub assistant_user_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = env::var("JWT_EXPIRATION")?
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(24);
        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")?,
            server_host: env::var("SERVER_HOST")?,
            server_port: env::var("SERVER_PORT")?.parse().unwrap_or(3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            rate_limit_requests: env::var("RATE_LIMIT_REQUESTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            max_search_radius_km: env::var("MAX_SEARCH_RADIUS_KM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50.0),
            default_community_radius_km: env::var("DEFAULT_COMMUNITY_RADIUS_KM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
            analysis_api_url: env::var("ANALYSIS_API_URL").ok(),
            analysis_api_key: env::var("ANALYSIS_API_KEY").ok(),
            analysis_model: env::var("ANALYSIS_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            analysis_confidence_threshold: env::var("ANALYSIS_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.5),
            assistant_user_id: env::var("ASSISTANT_USER_ID")
                .unwrap_or_else(|_| "ai-assistant".into()),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}
