use std::env;

/// Stripe credentials. Absent key = simulated checkout.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
}

/// Requests per minute for each rate limit tier. 0 disables the tier.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub strict_rpm: u32,
    pub standard_rpm: u32,
    pub relaxed_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 60,
            relaxed_rpm: 120,
        }
    }
}

/// Delay range between simulated build stages, in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct BuildSimulationConfig {
    pub step_min_ms: u64,
    pub step_max_ms: u64,
}

impl Default for BuildSimulationConfig {
    fn default() -> Self {
        Self {
            step_min_ms: 3000,
            step_max_ms: 5000,
        }
    }
}

/// Inputs for synthesizing delivery URLs.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    pub github_org: String,
    pub deploy_domain: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            github_org: "appforge-builds".to_string(),
            deploy_domain: "apps.appforge.dev".to_string(),
        }
    }
}

/// The single admin credential, read from the environment.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    pub admin: AdminCredentials,
    pub session_ttl_hours: i64,
    pub stripe: Option<StripeConfig>,
    pub webhook_secret: Option<String>,
    pub currency: String,
    pub build: BuildSimulationConfig,
    pub delivery: DeliveryConfig,
    pub pending_order_ttl_hours: i64,
    pub rate_limit: RateLimitConfig,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("APPFORGE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let base_url = env::var("BASE_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let build_defaults = BuildSimulationConfig::default();
        let step_min_ms = env_parse("BUILD_STEP_MIN_MS", build_defaults.step_min_ms);
        let step_max_ms = env_parse("BUILD_STEP_MAX_MS", build_defaults.step_max_ms).max(step_min_ms);

        let delivery_defaults = DeliveryConfig::default();
        let rate_defaults = RateLimitConfig::default();

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "appforge.db".to_string()),
            base_url,
            dev_mode,
            admin: AdminCredentials {
                email: env_nonempty("ADMIN_EMAIL"),
                password: env_nonempty("ADMIN_PASSWORD"),
                role: env::var("ADMIN_ROLE").unwrap_or_else(|_| "super_admin".to_string()),
            },
            session_ttl_hours: env_parse("ADMIN_SESSION_TTL_HOURS", 24),
            stripe: env_nonempty("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig { secret_key }),
            webhook_secret: env_nonempty("STRIPE_WEBHOOK_SECRET"),
            currency: env::var("CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or_else(|_| "usd".to_string()),
            build: BuildSimulationConfig {
                step_min_ms,
                step_max_ms,
            },
            delivery: DeliveryConfig {
                github_org: env::var("DELIVERY_GITHUB_ORG").unwrap_or(delivery_defaults.github_org),
                deploy_domain: env::var("DELIVERY_DEPLOY_DOMAIN")
                    .unwrap_or(delivery_defaults.deploy_domain),
            },
            pending_order_ttl_hours: env_parse("PENDING_ORDER_TTL_HOURS", 24),
            rate_limit: RateLimitConfig {
                strict_rpm: env_parse("RATE_LIMIT_STRICT_RPM", rate_defaults.strict_rpm),
                standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM", rate_defaults.standard_rpm),
                relaxed_rpm: env_parse("RATE_LIMIT_RELAXED_RPM", rate_defaults.relaxed_rpm),
            },
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
