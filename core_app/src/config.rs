//! Application configuration loaded from the environment.
//!
//! # Security Notes
//! - `db_pass_encrypt` is sensitive and must never be logged

use crate::{api::walk::ConflictScope, consts};
use envconfig::Envconfig;
use std::sync::LazyLock;

#[derive(Envconfig, Clone)]
pub struct AppConfig {
    /// Environment name to deploy the app (NON-SENSITIVE)
    /// Values: "local", "dev", "staging", "prod"
    #[envconfig(default = "local")]
    pub env: String,

    /// Database host value (NON-SENSITIVE)
    /// Example: "sqlite:data/app.db"
    pub db_host: String,

    /// 🔒 SENSITIVE: Database password to encrypt SQLite data
    #[envconfig(default = "")]
    pub db_pass_encrypt: String,

    /// Bucket holding the pet pictures (NON-SENSITIVE)
    #[envconfig(default = "pet-sponsor-app-storage")]
    pub s3_bucket_name: String,

    #[envconfig(default = "us-east-2")]
    pub aws_region: String,

    /// Which walks compete for a time slot (NON-SENSITIVE)
    /// Values: "per_pet", "global"
    #[envconfig(default = "per_pet")]
    pub walk_conflict_scope: String,
}

impl AppConfig {
    /// Checks if running in production environment
    pub fn is_prod(&self) -> bool {
        self.env.to_lowercase() == "prod"
    }

    pub fn conflict_scope(&self) -> anyhow::Result<ConflictScope> {
        self.walk_conflict_scope.parse()
    }

    pub fn bucket_name(&self) -> &str {
        if self.s3_bucket_name.is_empty() {
            return consts::DEFAULT_S3_BUCKET_NAME;
        }
        &self.s3_bucket_name
    }
}

/// Global application configuration, read once on first access.
///
/// Panics with a descriptive message if a required variable is missing.
pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(|| {
    AppConfig::init_from_env()
        .expect("Failed to load application configuration. Check DB_HOST and the other environment variables.")
});
