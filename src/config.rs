use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Outbound Lightning gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerollConfig {
    pub cooldown_hours: i64,
    pub selector_max_attempts: u32,
    pub commit_retries: u32,
}

impl Default for RerollConfig {
    fn default() -> Self {
        Self {
            cooldown_hours: 7 * 24,
            selector_max_attempts: 10_000,
            commit_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub gateway: GatewayConfig,
    pub reroll: RerollConfig,
    pub reviews_page_size: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "spot-reroll".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "spot-reroll-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
        };
        let gateway = GatewayConfig {
            base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.opennode.com".into()),
            api_key: std::env::var("GATEWAY_API_KEY")?,
            timeout_secs: env_or("GATEWAY_TIMEOUT_SECS", 5),
        };
        let defaults = RerollConfig::default();
        let reroll = RerollConfig {
            cooldown_hours: env_or("REROLL_COOLDOWN_HOURS", defaults.cooldown_hours),
            selector_max_attempts: env_or("SELECTOR_MAX_ATTEMPTS", defaults.selector_max_attempts),
            commit_retries: env_or("REROLL_COMMIT_RETRIES", defaults.commit_retries),
        };
        Ok(Self {
            database_url,
            jwt,
            gateway,
            reroll,
            reviews_page_size: env_or("REVIEWS_PAGE_SIZE", 5),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
