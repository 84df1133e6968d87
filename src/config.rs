use serde::Deserialize;

impl Config {

    pub fn init() -> Result<Self, config::ConfigError> {
        // get config toml dir from env, with default
        let config_path =
            std::env::var("FLIXPOST_CONFIG_PATH").unwrap_or_else(|_| String::from("./config.toml"));

        let config = config::Config::builder()
            // Add in config toml
            .add_source(config::File::with_name(&config_path).required(false))
            // Add in settings from the environment (with a prefix of FLIXPOST)
            .add_source(config::Environment::with_prefix("FLIXPOST").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

// ================================================================================================
// Models
// ================================================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct Config {
    pub logs: LogsConfig,
    pub telegram: TelegramConfig,
    pub gdflix: GdflixConfig,
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub imagehost: ImageHostConfig,
    #[serde(default)]
    pub posters: PostersConfig,
}

// ===============================================================================
// Logs
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct LogsConfig {
    pub level: String,
}

// ===============================================================================
// Telegram
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Only the owner can /authorize groups. None disables the check.
    #[serde(default)]
    pub owner_id: Option<i64>,
    /// Empty list allows everyone.
    #[serde(default)]
    pub allowed_users: Vec<i64>,
    #[serde(default = "default_dev_link")]
    pub dev_link: String,
    #[serde(default)]
    pub start_photo_url: Option<String>,
    #[serde(default)]
    pub help_photo_url: Option<String>,
}

fn default_dev_link() -> String {
    "https://t.me/J1_CHANG_WOOK".to_string()
}

// ===============================================================================
// GdFlix
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct GdflixConfig {
    pub api_key: String,
    #[serde(default = "default_gdflix_api_base")]
    pub api_base: String,
    #[serde(default = "default_gdflix_file_base")]
    pub file_base: String,
}

fn default_gdflix_api_base() -> String {
    "https://gdlink.dev/v2".to_string()
}

fn default_gdflix_file_base() -> String {
    "https://gdlink.dev/file".to_string()
}

// ===============================================================================
// TMDB
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct TmdbConfig {
    pub api_key: String,
}

// ===============================================================================
// Workers mirror
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct WorkersConfig {
    #[serde(default = "default_workers_base")]
    pub base: String,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            base: default_workers_base(),
        }
    }
}

fn default_workers_base() -> String {
    "https://gd.rickgrimesflix.workers.dev".to_string()
}

// ===============================================================================
// Image host
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct ImageHostConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_imagehost_upload_api")]
    pub upload_api: String,
}

impl Default for ImageHostConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            upload_api: default_imagehost_upload_api(),
        }
    }
}

fn default_imagehost_upload_api() -> String {
    "https://freeimage.host/api/1/upload".to_string()
}

// ===============================================================================
// Streaming posters
// ===============================================================================

#[derive(Debug, Clone, Deserialize)]
#[allow(unused)]
pub struct PostersConfig {
    #[serde(default = "default_netflix_api")]
    pub netflix_api: String,
}

impl Default for PostersConfig {
    fn default() -> Self {
        Self {
            netflix_api: default_netflix_api(),
        }
    }
}

fn default_netflix_api() -> String {
    "https://nf.rickgrimesapi.workers.dev/?movieid=".to_string()
}
