pub const API_TOKEN_ENV: &str = "SEATABLE_API_TOKEN";

/// API configuration resolved once at stage entry; passed explicitly from
/// there, never read from ambient state again.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub api_token: String,
}

impl Config {
    pub fn from_env(server: &str) -> anyhow::Result<Self> {
        let api_token = std::env::var(API_TOKEN_ENV)
            .map_err(|_| anyhow::anyhow!("{API_TOKEN_ENV} is not set"))?;
        if api_token.trim().is_empty() {
            anyhow::bail!("{API_TOKEN_ENV} is empty");
        }

        Ok(Self {
            server: server.to_owned(),
            api_token,
        })
    }
}
