use std::collections::HashMap;
use std::fs;

use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8000/api".into(),
        }
    }
}

/// Defaults, overridden by `crm.toml`, overridden by the environment.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("crm.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("api_base") {
                settings.api_base = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("CRM_API_BASE") {
        settings.api_base = v;
    }

    settings
}

/// Validates the configured base URL and strips any trailing slash so the
/// transport can append collection paths.
pub fn normalize_api_base(raw: &str) -> anyhow::Result<String> {
    let raw = raw.trim();
    let url = url::Url::parse(raw).with_context(|| format!("invalid api base url '{raw}'"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        bail!("api base url must use http or https, got '{}'", url.scheme());
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slashes_from_the_api_base() {
        assert_eq!(
            normalize_api_base("http://127.0.0.1:8000/api/").expect("valid"),
            "http://127.0.0.1:8000/api"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(normalize_api_base("ftp://example.com/api").is_err());
        assert!(normalize_api_base("not a url").is_err());
    }
}
