use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Base URL the QR codes point at; the frontend resolves tokens there.
    pub frontend_url: String,
    /// Comma-separated allowed CORS origins.
    pub cors_allow_origins: Vec<String>,
    /// Default ttl for tokens issued without an explicit one. 0 = no time
    /// expiry (single-use only). Set via SATAPLAN_DEFAULT_TOKEN_TTL_SECS.
    pub default_token_ttl_secs: i64,
    /// Ttl for tokens issued through the secret-gated unlock flow.
    /// Set via SATAPLAN_UNLOCK_TOKEN_TTL_SECS. Default: 900.
    pub unlock_token_ttl_secs: i64,
    /// How long consumed/expired tokens are kept before the cleanup job
    /// deletes them. Set via SATAPLAN_TOKEN_RETENTION_HOURS. Default: 24.
    pub token_retention_hours: i64,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("SATAPLAN_PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .unwrap_or(8000),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/sataplan".into()),
        frontend_url: std::env::var("SATAPLAN_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into()),
        cors_allow_origins: parse_origins(
            &std::env::var("CORS_ALLOW_ORIGINS").unwrap_or_default(),
        ),
        default_token_ttl_secs: std::env::var("SATAPLAN_DEFAULT_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        unlock_token_ttl_secs: std::env::var("SATAPLAN_UNLOCK_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(900),
        token_retention_hours: std::env::var("SATAPLAN_TOKEN_RETENTION_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(24),
    })
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_parse_with_whitespace_and_trailing_commas() {
        assert!(parse_origins("").is_empty());
        assert_eq!(
            parse_origins("https://app.sataplan.com, http://localhost:3000 ,"),
            vec![
                "https://app.sataplan.com".to_string(),
                "http://localhost:3000".to_string(),
            ]
        );
    }
}
