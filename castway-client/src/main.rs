use castway_core::{LaunchConfig, Manifest, Player};
use castway_runner::{resolve_server, Supervisor};
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "castway")]
#[command(about = "Launch and supervise the remote-scrcpy server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Gateway URL used by the health and url subcommands
    #[arg(long, default_value = "http://localhost:3000")]
    server: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the remote-scrcpy server and supervise it until it exits
    Run {
        /// Listening port forwarded to the server
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address forwarded to the server
        #[arg(long)]
        host: Option<String>,

        /// Explicit path to the remote-scrcpy executable
        #[arg(long)]
        server_bin: Option<PathBuf>,

        /// Launch manifest (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Check gateway health
    Health,

    /// Print the device server URLs
    Url {
        /// Device identifier for the embed view
        #[arg(long)]
        udid: Option<String>,

        /// Video decoder for the embed view (mse, broadway, tinyh264, webcodecs)
        #[arg(long)]
        player: Option<Player>,
    },

    /// Generate a launch manifest template
    Init {
        /// Where to write the manifest
        #[arg(short, long, default_value = "castway.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Run {
            port,
            host,
            server_bin,
            config,
        } => {
            run_server(port, host, server_bin.as_deref(), config.as_deref()).await?;
        }
        Commands::Health => {
            if check_health(&client, &cli.server).await? {
                println!("Gateway is healthy");
            } else {
                eprintln!("Gateway is unhealthy");
                process::exit(1);
            }
        }
        Commands::Url { udid, player } => {
            let urls = fetch_urls(&client, &cli.server, udid.as_deref(), player).await?;
            println!("Device server: {}", urls.url);
            println!("Embed view:    {}", urls.embed_url);
        }
        Commands::Init { path } => {
            generate_manifest_template(&path)?;
        }
    }

    Ok(())
}

/// The launcher itself: resolve the executable, supervise it, and exit
/// this process with the child's exit code.
async fn run_server(
    port: Option<u16>,
    host: Option<String>,
    server_bin: Option<&Path>,
    manifest_path: Option<&Path>,
) -> anyhow::Result<()> {
    let manifest = match manifest_path {
        Some(path) => Manifest::load(path)
            .map_err(|e| anyhow::anyhow!("failed to load manifest at {}: {}", path.display(), e))?,
        None => Manifest::default(),
    };

    // A manifest is explicit operator intent and becomes the base
    // configuration; otherwise PORT/HOST come from the environment.
    // Flags win either way.
    let mut config = match manifest_path {
        Some(_) => manifest.server.clone(),
        None => LaunchConfig::from_env()?,
    };
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(host) = host {
        config.host = host;
    }

    println!("Starting remote-scrcpy server...");
    println!("Port: {}", config.port);
    println!("Host: {}", config.host);

    let executable = match resolve_server(server_bin) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("Failed to start server: {}", err);
            process::exit(1);
        }
    };

    let supervisor = Supervisor::new(executable, config)
        .with_restart_policy(manifest.restart.clone())
        .with_shutdown_policy(manifest.shutdown.clone());

    match supervisor.run().await {
        Ok(summary) => {
            println!("Server exited with code {}", summary.code);
            process::exit(summary.code);
        }
        Err(err) => {
            eprintln!("Failed to start server: {}", err);
            process::exit(1);
        }
    }
}

async fn check_health(client: &Client, server: &str) -> anyhow::Result<bool> {
    let url = format!("{}/api/health", server);
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("failed to reach gateway at {}: {}", server, e))?;
    Ok(response.status().is_success())
}

#[derive(serde::Deserialize)]
struct ScrcpyUrlResponse {
    url: String,
    #[serde(rename = "embedUrl")]
    embed_url: String,
}

async fn fetch_urls(
    client: &Client,
    server: &str,
    udid: Option<&str>,
    player: Option<Player>,
) -> anyhow::Result<ScrcpyUrlResponse> {
    let mut request = client.get(format!("{}/api/scrcpy-url", server));

    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(udid) = udid {
        query.push(("udid", udid.to_string()));
    }
    if let Some(player) = player {
        query.push(("player", player.to_string()));
    }
    if !query.is_empty() {
        request = request.query(&query);
    }

    let response = request
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("failed to reach gateway at {}: {}", server, e))?;

    if !response.status().is_success() {
        anyhow::bail!("gateway returned {}", response.status());
    }

    Ok(response.json().await?)
}

const MANIFEST_TEMPLATE: &str = r#"# castway.toml - launch manifest for the remote-scrcpy server

[server]
# Listening port and bind address forwarded to the server process.
port = 8009
host = "0.0.0.0"

[restart]
# Relaunch the server when it exits on its own. Exits within
# min_uptime_secs count toward max_restarts.
autorestart = false
max_restarts = 10
min_uptime_secs = 10

[shutdown]
# Grace period between the forwarded signal and a forced kill.
# Remove to wait indefinitely.
kill_timeout_secs = 5
"#;

fn generate_manifest_template(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        eprintln!("Error: manifest already exists at {}", path.display());
        eprintln!("Use a different filename or remove the existing file.");
        process::exit(1);
    }

    fs::write(path, MANIFEST_TEMPLATE)?;
    println!("✓ Created manifest template at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_template_parses() {
        let manifest = Manifest::parse(MANIFEST_TEMPLATE).unwrap();
        assert_eq!(manifest.server.port, 8009);
        assert_eq!(manifest.server.host, "0.0.0.0");
        assert!(!manifest.restart.autorestart);
        assert_eq!(manifest.shutdown.kill_timeout_secs, Some(5));
    }

    #[tokio::test]
    async fn test_check_health_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"ok","timestamp":"2024-01-01T00:00:00Z"}"#)
            .create_async()
            .await;

        let client = Client::new();
        assert!(check_health(&client, &server.url()).await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_check_health_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/health")
            .with_status(500)
            .create_async()
            .await;

        let client = Client::new();
        assert!(!check_health(&client, &server.url()).await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_urls() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/scrcpy-url")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"url":"http://localhost:8009","embedUrl":"http://localhost:8009/embed.html"}"#,
            )
            .create_async()
            .await;

        let client = Client::new();
        let urls = fetch_urls(&client, &server.url(), None, None).await.unwrap();
        assert_eq!(urls.url, "http://localhost:8009");
        assert_eq!(urls.embed_url, "http://localhost:8009/embed.html");
    }
}
