use clap::{Parser, Subcommand};

use retail_ad_session::beacon::{BeaconSender, HttpBeaconSender};
use retail_ad_session::bridge;
use retail_ad_session::fetch::{AdFetcher, HttpAdFetcher};
use retail_ad_session::models::{DeviceInfo, VideoProgressEvent};
use retail_ad_session::{RunMode, SessionConfig};

/// Ad session diagnostics
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the ad inventory for a session
    Fetch {
        #[arg(long)]
        media_id: String,

        #[arg(long)]
        user_id: String,

        #[arg(long)]
        crypto: String,

        #[arg(long)]
        tag_group_id: String,

        /// Ad server environment
        #[arg(short, long, value_enum, default_value_t = RunMode::Stg)]
        mode: RunMode,

        /// Use this endpoint instead of the environment's
        #[arg(long)]
        endpoint: Option<String>,

        /// Pretty print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Decode one message as the embedded content would post it
    Decode {
        /// Channel name, e.g. playVideo
        #[arg(short, long)]
        channel: String,

        /// Raw message payload
        #[arg(short, long, default_value = "")]
        payload: String,
    },

    /// Send one impression or video progress beacon
    Beacon {
        #[arg(short, long)]
        endpoint: String,

        #[arg(short, long)]
        param: String,

        /// Progress event (start, quarter, half, threeQuarter, end); impression when omitted
        #[arg(long)]
        event: Option<String>,
    },
}

fn parse_progress_event(raw: &str) -> Option<VideoProgressEvent> {
    [
        VideoProgressEvent::Start,
        VideoProgressEvent::Quarter,
        VideoProgressEvent::Half,
        VideoProgressEvent::ThreeQuarter,
        VideoProgressEvent::End,
    ]
    .into_iter()
    .find(|event| event.as_str() == raw)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            media_id,
            user_id,
            crypto,
            tag_group_id,
            mode,
            endpoint,
            pretty,
        } => {
            let mut session = SessionConfig::new(media_id, user_id, crypto, tag_group_id, mode)
                .with_device(DeviceInfo {
                    make: "cli".to_string(),
                    os: std::env::consts::OS.to_string(),
                    ..DeviceInfo::default()
                });
            if let Some(endpoint) = endpoint {
                session = session.with_endpoint(endpoint);
            }

            let inventory = HttpAdFetcher::new()?.fetch_ads(&session).await?;

            if pretty {
                println!("{}", serde_json::to_string_pretty(&inventory)?);
            } else {
                println!("{}", serde_json::to_string(&inventory)?);
            }
        }
        Commands::Decode { channel, payload } => match bridge::decode(&channel, &payload)? {
            Some(event) => println!("{:?}", event),
            None => println!("ignored"),
        },
        Commands::Beacon {
            endpoint,
            param,
            event,
        } => {
            let event = match event {
                Some(raw) => Some(
                    parse_progress_event(&raw)
                        .ok_or_else(|| format!("unknown progress event: {}", raw))?,
                ),
                None => None,
            };
            HttpBeaconSender::new()?
                .send_beacon(&endpoint, &param, event)
                .await?;
            println!("Beacon delivered");
        }
    }

    Ok(())
}
