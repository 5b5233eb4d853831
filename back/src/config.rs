use std::path::PathBuf;

use clap::Parser;

/// Todo server with AI summaries.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Config {
    #[arg(long, env = "PORT", default_value_t = 3005)]
    pub port: u16,

    /// MongoDB connection string; the local data file is used when unset.
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    #[arg(long, env = "MONGODB_DATABASE", default_value = "recap")]
    pub database: String,

    #[arg(long, env = "DATA_FILE", default_value = "data.ron")]
    pub data_file: PathBuf,

    #[arg(long, env = "COHERE_API_KEY", hide_env_values = true)]
    pub cohere_api_key: Option<String>,

    #[arg(long, env = "COHERE_MODEL", default_value = "command-r-plus")]
    pub cohere_model: String,

    #[arg(long, env = "SLACK_WEBHOOK_URL", hide_env_values = true)]
    pub slack_webhook_url: Option<String>,

    #[arg(long, env = "SSL_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    #[arg(long, env = "SSL_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Config::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "recap-server",
            "--port",
            "8080",
            "--data-file",
            "todos.ron",
            "--cohere-model",
            "command-r",
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.data_file, PathBuf::from("todos.ron"));
        assert_eq!(config.cohere_model, "command-r");
    }

    #[test]
    fn tls_needs_both_files() {
        let result = Config::try_parse_from(["recap-server", "--tls-cert", "cert.pem"]);
        assert!(result.is_err());
    }
}
