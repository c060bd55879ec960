use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "PraanaCare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_JWT_SECRET: &str = "change_this_secret";
const DEFAULT_TOKEN_LIFETIME: &str = "7d";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";
const DEFAULT_OLLAMA_MODEL: &str = "llama3";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("JWT_SECRET must be set when APP_ENV=production")]
    MissingSecret,
}

/// Deployment environment. Development exposes internal error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Remote text generation backend, selected by which variables are present.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorConfig {
    OpenAi {
        base_url: String,
        api_key: String,
        model: String,
    },
    Ollama {
        base_url: String,
        model: String,
    },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub token_lifetime: chrono::Duration,
    pub frontend_url: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max: u32,
    pub environment: Environment,
    pub generator: Option<GeneratorConfig>,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = get("APP_ENV")
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        let port = match get("PORT") {
            Some(v) => v.trim().parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: v,
            })?,
            None => DEFAULT_PORT,
        };
        let ip = match get("BIND_ADDR") {
            Some(v) => v.trim().parse::<IpAddr>().map_err(|_| ConfigError::InvalidValue {
                key: "BIND_ADDR",
                value: v,
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if environment == Environment::Production => {
                return Err(ConfigError::MissingSecret)
            }
            None => {
                tracing::warn!("JWT_SECRET not set, using the development secret");
                DEFAULT_JWT_SECRET.to_string()
            }
        };

        let lifetime_raw = get("JWT_EXPIRE").unwrap_or_else(|| DEFAULT_TOKEN_LIFETIME.into());
        let token_lifetime =
            parse_lifetime(&lifetime_raw).ok_or(ConfigError::InvalidValue {
                key: "JWT_EXPIRE",
                value: lifetime_raw.clone(),
            })?;

        let window_minutes = parse_or(get("RATE_LIMIT_WINDOW"), "RATE_LIMIT_WINDOW", 15u64)?;
        let rate_limit_max = parse_or(get("RATE_LIMIT_MAX"), "RATE_LIMIT_MAX", 100u32)?;

        let generator = if let Some(api_key) = get("OPENAI_API_KEY") {
            Some(GeneratorConfig::OpenAi {
                base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.into()),
                api_key,
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
            })
        } else {
            get("OLLAMA_URL").map(|base_url| GeneratorConfig::Ollama {
                base_url,
                model: get("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.into()),
            })
        };

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_database_path),
            jwt_secret,
            token_lifetime,
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.into()),
            rate_limit_window_secs: window_minutes * 60,
            rate_limit_max,
            environment,
            generator,
        })
    }

    /// Defaults pointed at a specific database file. No generator configured.
    pub fn with_database(path: PathBuf) -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            database_path: path,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_lifetime: chrono::Duration::days(7),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            rate_limit_window_secs: 15 * 60,
            rate_limit_max: 100,
            environment: Environment::Test,
            generator: None,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue { key, value: v }),
        None => Ok(default),
    }
}

/// Parse a token lifetime such as `7d`, `12h`, `30m`, `45s`, or a bare
/// number of seconds.
pub fn parse_lifetime(raw: &str) -> Option<chrono::Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, unit) = match raw.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => (&raw[..idx], Some(c)),
        _ => (raw, None),
    };
    let amount: i64 = digits.parse().ok().filter(|n| *n > 0)?;
    match unit {
        Some('d') => Some(chrono::Duration::days(amount)),
        Some('h') => Some(chrono::Duration::hours(amount)),
        Some('m') => Some(chrono::Duration::minutes(amount)),
        Some('s') | None => Some(chrono::Duration::seconds(amount)),
        Some(_) => None,
    }
}

/// Get the application data directory (~/PraanaCare/).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

fn default_database_path() -> PathBuf {
    app_data_dir().join("praanacare.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "praanacare=info,praanacare_lib=info,tower_http=warn"
}
