use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use cloudevents_relay::envelope::{Event, ExtensionValue};
use cloudevents_relay::pb::cloud_events_service_client::CloudEventsServiceClient;
use cloudevents_relay::pb::ResourceWatchRequest;
use cloudevents_relay::work::types::EXTENSION_RESOURCE_ID;

#[derive(Parser)]
#[command(name = "ce-client")]
#[command(about = "Client for the CloudEvents work relay", long_about = None)]
struct Cli {
    /// gRPC endpoint of the relay.
    #[arg(short, long, default_value = "http://localhost:31320")]
    grpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a CloudEvents JSON file over gRPC
    Send {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Stream status events for a resource
    Watch {
        #[arg(long, default_value = "")]
        id: String,
    },
    /// POST a CloudEvents JSON file to the REST gateway
    Post {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long, default_value = "http://localhost:31330")]
        url: String,
    },
    /// Watch the event's resource, then send it
    Apply {
        #[arg(short, long)]
        file: PathBuf,
    },
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Send { file } => {
            let mut client = CloudEventsServiceClient::connect(cli.grpc).await?;
            let event = read_event(&file)?;
            let response = client.send(event.to_proto()).await?.into_inner();
            println!("{} (status {})", response.message, response.status().as_str_name());
        }
        Commands::Watch { id } => {
            let mut client = CloudEventsServiceClient::connect(cli.grpc).await?;
            watch(&mut client, id).await?;
        }
        Commands::Post { file, url } => {
            let body = std::fs::read(&file)?;
            let res = reqwest::Client::new()
                .post(format!("{}/v1/cloudevents", url.trim_end_matches('/')))
                .header(CONTENT_TYPE, HeaderValue::from_static("application/x-cloudevents"))
                .body(body)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Apply { file } => {
            let event = read_event(&file)?;
            let id = match event.extension(EXTENSION_RESOURCE_ID) {
                Some(ExtensionValue::String(id)) => id.clone(),
                _ => return Err(format!("{} has no string resourceid extension", file.display()).into()),
            };

            let mut watcher = CloudEventsServiceClient::connect(cli.grpc.clone()).await?;
            let mut stream = watcher
                .watch(ResourceWatchRequest { id: id.clone() })
                .await?
                .into_inner();

            let mut sender = CloudEventsServiceClient::connect(cli.grpc).await?;
            let response = sender.send(event.to_proto()).await?.into_inner();
            println!("{}", response.message);

            while let Some(status) = stream.message().await? {
                print_event(status)?;
            }
        }
    }

    Ok(())
}

fn read_event(path: &Path) -> CliResult<Event> {
    let bytes = std::fs::read(path)?;
    Ok(Event::from_json_slice(&bytes)?)
}

async fn watch(
    client: &mut CloudEventsServiceClient<tonic::transport::Channel>,
    id: String,
) -> CliResult<()> {
    let mut stream = client.watch(ResourceWatchRequest { id }).await?.into_inner();
    while let Some(status) = stream.message().await? {
        print_event(status)?;
    }
    Ok(())
}

fn print_event(pb: cloudevents_relay::pb::CloudEvent) -> CliResult<()> {
    let event = Event::from_proto(pb)?;
    println!("{}", serde_json::to_string_pretty(&event.to_json_value())?);
    Ok(())
}

async fn print_response(res: reqwest::Response) -> CliResult<()> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
