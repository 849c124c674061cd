use std::sync::Arc;

use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;

use analysis::AnalysisClient;

pub mod analysis;
pub mod config;
pub mod geo;
pub mod middleware;
pub mod utils;

pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub analyzer: Arc<AnalysisClient>,
}
