use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Map, Value};

use secret_gate::security::{BlacklistStore, SECRET_HEADER};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Client CLI for the secret-gate forwarding proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8280")]
    url: String,

    #[arg(short, long, env = "PROXY_SECRET_128", hide_env_values = true, default_value = "")]
    secret: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the proxy is up
    Health,
    /// Forward one request through the proxy
    Send {
        /// Destination URL
        target: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Extra header as `Name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        /// JSON body
        #[arg(long, conflicts_with = "data")]
        json: Option<String>,

        /// Raw body
        #[arg(long)]
        data: Option<String>,

        /// Destination timeout in seconds
        #[arg(short, long)]
        timeout: Option<f64>,
    },
    /// Print the blacklist file
    Blacklist {
        #[arg(short, long, default_value = "blacklist.txt")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Send {
            target,
            method,
            headers,
            json,
            data,
            timeout,
        } => {
            let mut payload = Map::new();
            payload.insert("method".into(), json!(method.to_uppercase()));
            payload.insert("url".into(), json!(target));
            if !headers.is_empty() {
                payload.insert("headers".into(), Value::Object(parse_headers(&headers)?));
            }
            if let Some(raw) = json {
                payload.insert("json".into(), serde_json::from_str(&raw)?);
            }
            if let Some(raw) = data {
                payload.insert("data".into(), json!(raw));
            }
            if let Some(secs) = timeout {
                payload.insert("timeout".into(), json!(secs));
            }

            let mut auth = HeaderMap::new();
            auth.insert(SECRET_HEADER, HeaderValue::from_str(&cli.secret)?);

            let res = client
                .post(format!("{}/proxy", cli.url))
                .headers(auth)
                .json(&Value::Object(payload))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Blacklist { path } => {
            let store = BlacklistStore::open(&path)?;
            let entries = store.entries()?;
            if entries.is_empty() {
                println!("No blacklisted sources in {}", path);
            }
            for entry in entries {
                println!("{}", entry);
            }
        }
    }

    Ok(())
}

fn parse_headers(raw: &[String]) -> Result<Map<String, Value>, String> {
    raw.iter()
        .map(|h| {
            let (name, value) = h
                .split_once(':')
                .ok_or_else(|| format!("header '{}' must look like 'Name: value'", h))?;
            Ok((name.trim().to_string(), json!(value.trim())))
        })
        .collect()
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Proxy returned status {}", status);
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
