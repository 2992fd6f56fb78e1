use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub api_key: String,
    pub folder_id: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Total generator calls per test, the first one included.
    pub max_attempts: u32,
    /// Share of the target count that ends the retry loop early.
    pub acceptance_ratio: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            acceptance_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app_env: String,
    pub listen_addr: String,
    pub storage: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_uri: String,
    pub jwt_secret: String,
    pub generator: GeneratorConfig,
    pub generation: GenerationConfig,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, local .env as fallback
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides (prefix: APP_)
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let listen_addr = settings
            .get_string("server.listen_addr")
            .or_else(|_| env::var("LISTEN_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let storage = match settings
            .get_string("storage.backend")
            .or_else(|_| env::var("STORAGE_BACKEND"))
            .unwrap_or_else(|_| "mongo".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => StorageBackend::Memory,
            "mongo" => StorageBackend::Mongo,
            other => {
                return Err(config::ConfigError::Message(format!(
                    "Unknown storage backend: {}",
                    other
                )))
            }
        };

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "quizforge".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                format!("redis://{}:{}/0", host, port)
            });

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if app_env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let generator = GeneratorConfig {
            api_url: settings
                .get_string("generator.api_url")
                .or_else(|_| env::var("GENERATOR_API_URL"))
                .unwrap_or_else(|_| {
                    "https://llm.api.cloud.yandex.net/foundationModels/v1/completion".to_string()
                }),
            api_key: settings
                .get_string("generator.api_key")
                .or_else(|_| env::var("GENERATOR_API_KEY"))
                .unwrap_or_default(),
            folder_id: settings
                .get_string("generator.folder_id")
                .or_else(|_| env::var("GENERATOR_FOLDER_ID"))
                .unwrap_or_default(),
            model: settings
                .get_string("generator.model")
                .or_else(|_| env::var("GENERATOR_MODEL"))
                .unwrap_or_else(|_| "yandexgpt".to_string()),
            temperature: settings
                .get_float("generator.temperature")
                .map(|value| value as f32)
                .unwrap_or(0.3),
            max_tokens: settings
                .get_int("generator.max_tokens")
                .ok()
                .and_then(|value| u32::try_from(value).ok())
                .unwrap_or(8000),
            timeout_secs: settings
                .get_int("generator.timeout_secs")
                .ok()
                .and_then(|value| u64::try_from(value).ok())
                .unwrap_or(90),
        };

        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            max_attempts: settings
                .get_int("generation.max_attempts")
                .ok()
                .and_then(|value| u32::try_from(value).ok())
                .filter(|value| *value > 0)
                .unwrap_or(defaults.max_attempts),
            acceptance_ratio: settings
                .get_float("generation.acceptance_ratio")
                .ok()
                .filter(|value| *value > 0.0 && *value <= 1.0)
                .unwrap_or(defaults.acceptance_ratio),
        };

        Ok(Config {
            app_env,
            listen_addr,
            storage,
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            generator,
            generation,
        })
    }

    /// Raw upstream causes are attached to error bodies outside production.
    pub fn expose_error_causes(&self) -> bool {
        self.app_env != "prod"
    }

    /// Configuration for tests and local runs without external services.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Config {
            app_env: "test".to_string(),
            listen_addr: "127.0.0.1:0".to_string(),
            storage: StorageBackend::Memory,
            mongo_uri: String::new(),
            mongo_database: "quizforge".to_string(),
            redis_uri: String::new(),
            jwt_secret: jwt_secret.to_string(),
            generator: GeneratorConfig {
                api_url: String::new(),
                api_key: String::new(),
                folder_id: String::new(),
                model: "mock".to_string(),
                temperature: 0.0,
                max_tokens: 0,
                timeout_secs: 1,
            },
            generation: GenerationConfig::default(),
        }
    }
}
