use std::env;

/// Route prefix used when `PREFIX` is not set
pub const DEFAULT_PREFIX: &str = "/stitch";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Path prefix every stitcher route lives under, e.g. `/stitch`
    pub prefix: String,
    /// Scheme and host prepended to generated asset-list links; relative
    /// links are emitted when unset
    pub asset_list_base_url: Option<String>,
    pub is_dev: bool,
    /// Skip SSRF validation of upstream URLs (source, renditions, ads)
    pub allow_private_origins: bool,
}

/// Leading slash, no trailing slash; `/` and empty collapse to no prefix
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl Config {
    /// Load configuration from environment variables
    /// In DEV mode, provides sensible defaults. In PROD mode, PORT is required.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let is_dev = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Port: required in prod, defaults to 3000 in dev
        let port = if is_dev {
            env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?
        } else {
            env::var("PORT")
                .map_err(|_| "PORT is required in production")?
                .parse()?
        };

        let prefix = normalize_prefix(
            &env::var("PREFIX").unwrap_or_else(|_| DEFAULT_PREFIX.to_string()),
        );

        let asset_list_base_url = env::var("ASSET_LIST_BASE_URL")
            .ok()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        // Private origins: allowed in dev so local test streams work
        let allow_private_origins = env::var("ALLOW_PRIVATE_ORIGINS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(is_dev);

        Ok(Config {
            port,
            prefix,
            asset_list_base_url,
            is_dev,
            allow_private_origins,
        })
    }
}
