//! httpsink CLI

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use httpsink::config::Config;
use httpsink::network::SinkServer;

/// Request-capturing mock HTTP endpoint
#[derive(Parser, Debug)]
#[command(name = "httpsink", author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file, overridden by the flags below
    #[arg(short, long, env = "HTTPSINK_CONFIG")]
    config: Option<PathBuf>,

    /// Network interface to run on
    #[arg(long, env = "HTTPSINK_HOST")]
    host: Option<String>,

    /// Port to run on
    #[arg(short, long, env = "HTTPSINK_PORT")]
    port: Option<u16>,

    /// Sink capacity, 0 for unbounded
    #[arg(long, env = "HTTPSINK_CAPACITY")]
    capacity: Option<usize>,

    /// TTL of sink requests, e.g. "30s" or "5m"
    #[arg(long, env = "HTTPSINK_TTL", value_parser = humantime::parse_duration)]
    ttl: Option<Duration>,

    /// How often expired requests are swept
    #[arg(long, env = "HTTPSINK_SWEEP_INTERVAL", value_parser = humantime::parse_duration)]
    sweep_interval: Option<Duration>,

    /// URL to proxy captured requests to
    #[arg(long, env = "HTTPSINK_PROXY")]
    proxy: Option<String>,

    /// Timeout for proxied requests
    #[arg(long, env = "HTTPSINK_MIRROR_TIMEOUT", value_parser = humantime::parse_duration)]
    mirror_timeout: Option<Duration>,
}

impl Args {
    /// Layer flags over the file (or default) configuration
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(ttl) = self.ttl {
            config.ttl = Some(ttl);
        }
        if let Some(sweep_interval) = self.sweep_interval {
            config.sweep_interval = sweep_interval;
        }
        if let Some(proxy) = self.proxy.filter(|proxy| !proxy.is_empty()) {
            config.proxy = Some(proxy);
        }
        if let Some(mirror_timeout) = self.mirror_timeout {
            config.mirror_timeout = Some(mirror_timeout);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("httpsink=info")),
        )
        .init();

    let config = Args::parse().into_config()?;

    let server = SinkServer::bind(&config)
        .await
        .with_context(|| format!("error listening on {}", config.listen_addr()))?;

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "httpsink",
            "--port",
            "8080",
            "--capacity",
            "5",
            "--ttl",
            "30s",
            "--proxy",
            "http://localhost:9000",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.capacity, 5);
        assert_eq!(config.ttl, Some(Duration::from_secs(30)));
        assert_eq!(config.proxy.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"port = 9999\ncapacity = 3\n").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let args = Args::try_parse_from(["httpsink", "--config", &path, "--capacity", "7"]).unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.capacity, 7);
    }

    #[test]
    fn test_invalid_ttl_flag() {
        let result = Args::try_parse_from(["httpsink", "--ttl", "soon"]);
        assert!(result.is_err());
    }
}
