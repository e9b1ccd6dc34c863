use std::time::Duration;

use canvas::cache::{RenderCache, SwapOutcome};
use clap::{Args, Parser, Subcommand};
use frames::{Data, FRAME_MESSAGE, Frame, Status};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("websocket connect failed: {0}")]
    WsConnect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("websocket closed")]
    WsClosed,
    #[error("frame decode failed: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("timed out waiting for websocket frame")]
    Timeout,
    #[error("server returned error for {syscall}: {message}")]
    ServerError { syscall: String, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "fogboard-cli", about = "Fogboard API and websocket CLI")]
struct Cli {
    #[arg(long, env = "FOGBOARD_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Adventure(AdventureCommand),
    /// Exchange the host password for a websocket ticket.
    Verify {
        adventure_id: Uuid,
        #[arg(long)]
        password: Option<String>,
    },
    /// Join as an observer and print every broadcast the host sends.
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct AdventureCommand {
    #[command(subcommand)]
    command: AdventureSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdventureSubcommand {
    List,
    Create {
        #[arg(long, default_value = "Untitled Adventure")]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    Delete {
        adventure_id: Uuid,
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Args, Debug)]
struct WatchArgs {
    adventure_id: Uuid,

    /// Stop after this many broadcast frames (0 runs until the socket closes).
    #[arg(long, default_value_t = 0)]
    max_frames: usize,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let base_url = cli.base_url;

    match cli.command {
        Command::Ping => run_ping(&base_url).await,
        Command::Adventure(adventure) => run_adventure(&base_url, adventure).await,
        Command::Verify {
            adventure_id,
            password,
        } => run_verify(&base_url, adventure_id, password).await,
        Command::Watch(args) => run_watch(&base_url, args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/healthz", base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            syscall: format!("HTTP {}", status.as_u16()),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn run_adventure(base_url: &str, adventure: AdventureCommand) -> Result<(), CliError> {
    match adventure.command {
        AdventureSubcommand::List => {
            let json = api_request(base_url, reqwest::Method::GET, "/api/adventure", None).await?;
            print_json(&json)?;
            Ok(())
        }
        AdventureSubcommand::Create {
            name,
            description,
            password,
        } => {
            let json = api_request(
                base_url,
                reqwest::Method::POST,
                "/api/adventure",
                Some(serde_json::json!({
                    "name": name,
                    "description": description,
                    "password": password,
                })),
            )
            .await?;
            print_json(&json)?;
            Ok(())
        }
        AdventureSubcommand::Delete {
            adventure_id,
            password,
        } => {
            let path = format!("/api/adventure/{adventure_id}");
            let json = api_request(
                base_url,
                reqwest::Method::DELETE,
                &path,
                Some(serde_json::json!({ "password": password })),
            )
            .await?;
            print_json(&json)?;
            Ok(())
        }
    }
}

async fn run_verify(
    base_url: &str,
    adventure_id: Uuid,
    password: Option<String>,
) -> Result<(), CliError> {
    let path = format!("/api/adventure/{adventure_id}/verify");
    let json = api_request(
        base_url,
        reqwest::Method::POST,
        &path,
        Some(serde_json::json!({ "password": password })),
    )
    .await?;
    print_json(&json)?;
    Ok(())
}

async fn run_watch(base_url: &str, args: WatchArgs) -> Result<(), CliError> {
    let path = format!("/api/adventure/{}/join", args.adventure_id);
    let joined = api_request(base_url, reqwest::Method::POST, &path, None).await?;
    let ticket = joined
        .get("ticket")
        .and_then(Value::as_str)
        .ok_or(CliError::MissingField("ticket"))?;

    let ws_url = ws_url(base_url, ticket)?;
    let (mut stream, _) = connect_async(ws_url)
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))?;

    wait_for_session_connected(&mut stream).await?;

    let join = Frame::request("session:join", Data::new());
    let join_id = join.id;
    stream
        .send(Message::Text(frames::encode_frame(&join).into()))
        .await
        .map_err(|error| CliError::WsConnect(Box::new(error)))?;
    let snapshot = wait_for_terminal_response(&mut stream, join_id, "session:join").await?;

    let map_count = snapshot
        .data
        .get("maps")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    let active = snapshot
        .data
        .get("active_map_id")
        .and_then(Value::as_str)
        .unwrap_or("none");
    eprintln!("joined adventure {}: {map_count} maps, active={active}", args.adventure_id);

    let mut cache = RenderCache::new();
    seed_cache_from_snapshot(&mut cache, &snapshot);

    let mut seen = 0_usize;
    loop {
        let frame = match recv_next(&mut stream, Duration::from_secs(300)).await {
            Ok(frame) => frame,
            Err(CliError::WsClosed) => break,
            Err(error) => return Err(error),
        };
        handle_broadcast(&mut cache, &frame);
        seen = seen.saturating_add(1);
        if args.max_frames > 0 && seen >= args.max_frames {
            break;
        }
    }

    eprintln!("watch complete: {seen} broadcast frames");
    Ok(())
}

/// Decode the active map's stored mask before the first broadcast arrives,
/// so a freshly-joined observer starts fogged rather than fully revealed.
fn seed_cache_from_snapshot(cache: &mut RenderCache, snapshot: &Frame) {
    let Some(active) = snapshot
        .data
        .get("active_map_id")
        .and_then(Value::as_str)
        .and_then(|value| Uuid::parse_str(value).ok())
    else {
        return;
    };
    let Some(maps) = snapshot.data.get("maps").and_then(Value::as_array) else {
        return;
    };
    for map in maps {
        let map_id = map
            .get("id")
            .and_then(Value::as_str)
            .and_then(|value| Uuid::parse_str(value).ok());
        if map_id != Some(active) {
            continue;
        }
        if let Some(mask) = map.get("mask_data").and_then(Value::as_str) {
            let outcome = cache.apply(active, mask);
            eprintln!("seeded mask for active map {active}: {}", describe_swap(outcome));
        }
        return;
    }
}

fn handle_broadcast(cache: &mut RenderCache, frame: &Frame) {
    if frame.syscall == "mask:update" {
        let map_id = frame
            .data
            .get("map_id")
            .and_then(Value::as_str)
            .and_then(|value| Uuid::parse_str(value).ok());
        let mask = frame.data.get("mask").and_then(Value::as_str);
        if let (Some(map_id), Some(mask)) = (map_id, mask) {
            let outcome = cache.apply(map_id, mask);
            let dims = cache
                .displayed()
                .map_or_else(|| "-".to_owned(), |cached| {
                    format!("{}x{}", cached.image.width(), cached.image.height())
                });
            println!("mask:update map={map_id} {} displayed={dims}", describe_swap(outcome));
            return;
        }
    }

    if frame.syscall == "map:delete" {
        let deleted = frame
            .data
            .get("map_id")
            .and_then(Value::as_str)
            .and_then(|value| Uuid::parse_str(value).ok());
        if deleted.is_some() && cache.displayed().map(|cached| cached.map_id) == deleted {
            cache.clear();
        }
    }

    let data = serde_json::to_string(&frame.data).unwrap_or_else(|_| "{}".to_owned());
    println!("{} {data}", frame.syscall);
}

fn describe_swap(outcome: SwapOutcome) -> &'static str {
    match outcome {
        SwapOutcome::Swapped => "swapped",
        SwapOutcome::Unchanged => "unchanged",
        SwapOutcome::Retained => "decode failed, retained previous",
    }
}

async fn api_request(
    base_url: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);

    let request = client.request(method, &url);
    let request = if let Some(json) = body {
        request.json(&json)
    } else {
        request
    };

    let response = request.send().await?;
    let status = response.status();
    let value = response
        .json::<Value>()
        .await
        .unwrap_or_else(|_| Value::Null);

    if !status.is_success() {
        return Err(CliError::ServerError {
            syscall: format!("HTTP {}", status.as_u16()),
            message: value.to_string(),
        });
    }

    Ok(value)
}

fn ws_url(base_url: &str, ticket: &str) -> Result<String, CliError> {
    if let Some(rest) = base_url.strip_prefix("http://") {
        return Ok(format!("ws://{rest}/api/ws?ticket={ticket}"));
    }
    if let Some(rest) = base_url.strip_prefix("https://") {
        return Ok(format!("wss://{rest}/api/ws?ticket={ticket}"));
    }

    Err(CliError::InvalidBaseUrl(base_url.to_owned()))
}

async fn wait_for_session_connected(
    stream: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) -> Result<(), CliError> {
    loop {
        let frame = recv_next(stream, Duration::from_secs(5)).await?;
        if frame.syscall == "session:connected" {
            return Ok(());
        }
    }
}

async fn wait_for_terminal_response(
    stream: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    request_id: Uuid,
    syscall: &str,
) -> Result<Frame, CliError> {
    loop {
        let frame = recv_next(stream, Duration::from_secs(15)).await?;
        if frame.parent_id != Some(request_id) {
            continue;
        }
        if frame.syscall != syscall {
            continue;
        }
        if !frame.status.is_terminal() {
            continue;
        }
        if frame.status == Status::Error {
            return Err(CliError::ServerError {
                syscall: frame.syscall,
                message: frame
                    .data
                    .get(FRAME_MESSAGE)
                    .and_then(Value::as_str)
                    .unwrap_or("unknown websocket error")
                    .to_owned(),
            });
        }
        return Ok(frame);
    }
}

async fn recv_next(
    stream: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    timeout: Duration,
) -> Result<Frame, CliError> {
    let fut = async {
        loop {
            let Some(message) = stream.next().await else {
                return Err(CliError::WsClosed);
            };
            match message.map_err(|error| CliError::WsConnect(Box::new(error)))? {
                Message::Text(text) => {
                    return frames::decode_frame(&text).map_err(CliError::from);
                }
                Message::Close(_) => return Err(CliError::WsClosed),
                _ => {}
            }
        }
    };

    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| CliError::Timeout)?
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
