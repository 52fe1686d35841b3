// wearsync CLI - run the phone/watch demo and inspect encoded payloads

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wearsync::app::{
    Colour, ColourError, PhoneCompanion, StaticWeatherSource, WatchCompanion, WatchFaceConfig,
    WeatherReport,
};
use wearsync::identity::PeerId;
use wearsync::network::{NetworkConfig, WearableNetwork};
use wearsync::payload::{CodecError, FieldValue, Payload, PayloadCodec, PayloadError};
use wearsync::replication::ReplicationStore;
use wearsync::session::{SessionConfig, SyncSession};
use wearsync::storage::{ItemStore, StoreError};
use wearsync::SyncError;

#[derive(Parser)]
#[command(name = "wearsync")]
#[command(about = "Phone/watch companion sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a phone and a watch on one in-process network and print face frames
    Demo(DemoArgs),

    /// Encode fields into a payload
    Encode {
        /// Field as key=type:value, where type is str, int or long
        #[arg(short, long = "field", required = true)]
        fields: Vec<String>,

        /// Print base64 instead of hex
        #[arg(long)]
        base64: bool,
    },

    /// Decode a payload and print its fields
    Decode {
        /// Encoded payload
        input: String,

        /// Input is base64 instead of hex
        #[arg(long)]
        base64: bool,
    },
}

#[derive(Args)]
struct DemoArgs {
    /// Persist replicated items here (memory only when omitted)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Watch face background colour
    #[arg(long, default_value = "black")]
    background: String,

    /// Watch face date and time colour
    #[arg(long, default_value = "white")]
    date_time_colour: String,

    /// Weather condition id
    #[arg(long, default_value = "800")]
    weather_id: i32,

    #[arg(long, default_value = "25°")]
    high: String,

    #[arg(long, default_value = "16°")]
    low: String,

    /// Number of frames to print
    #[arg(long, default_value = "3")]
    ticks: u32,

    #[arg(long, default_value = "1000")]
    tick_ms: u64,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Invalid field {0}: expected key=type:value")]
    FieldSyntax(String),

    #[error("Unknown field type {0}: expected str, int or long")]
    FieldType(String),

    #[error("Invalid number in field {0}")]
    FieldNumber(String),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Colour(#[from] ColourError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    App(#[from] wearsync::app::AppError),
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Demo(args) => run_demo(args).await,
        Commands::Encode { fields, base64 } => run_encode(&fields, base64),
        Commands::Decode { input, base64 } => run_decode(&input, base64),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// DEMO
// ============================================================================

async fn run_demo(args: DemoArgs) -> Result<(), CliError> {
    let face_config = WatchFaceConfig::new()
        .with_background(args.background.parse::<Colour>()?)
        .with_date_time_colour(args.date_time_colour.parse::<Colour>()?);

    let network_config = NetworkConfig::new();
    network_config.validate()?;
    let session_config = SessionConfig::new();
    session_config.validate()?;

    let (store, phone_id) = match &args.data_dir {
        Some(dir) => {
            let items = ItemStore::open(dir)?;
            let phone_id = items.get_or_create_node_id()?;
            (ReplicationStore::with_storage(items)?, phone_id)
        }
        None => (ReplicationStore::new(), PeerId::generate()),
    };
    info!(items = store.len(), clock = store.clock(), "store ready");

    let network = WearableNetwork::with_store(network_config, store);

    // Phone
    let (phone_session, phone_events) =
        SyncSession::new(phone_id, network.clone(), session_config.clone());
    let report = WeatherReport::new(args.weather_id, args.high, args.low);
    let phone = PhoneCompanion::new(phone_session, Arc::new(StaticWeatherSource::new(report)));

    phone.session().connect().await?;
    phone.publish_watch_face_config(&face_config).await?;
    phone.publish_weather().await?;
    let phone_task = tokio::spawn({
        let phone = phone.clone();
        async move { phone.run(phone_events).await }
    });

    // Watch
    let (watch_session, watch_events) =
        SyncSession::new(PeerId::generate(), network.clone(), session_config);
    let watch = WatchCompanion::new(watch_session);
    let watch_task = tokio::spawn({
        let watch = watch.clone();
        async move { watch.run(watch_events).await }
    });
    watch.session().connect().await?;

    let mut ticker = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    for _ in 0..args.ticks {
        ticker.tick().await;
        let frame = watch.frame(&chrono::Local::now().naive_local());
        println!(
            "{}  {}  {}  high {} low {}  bg {} fg {}",
            frame.time,
            frame.date,
            frame.condition.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            frame.high.as_deref().unwrap_or("-"),
            frame.low.as_deref().unwrap_or("-"),
            frame.background,
            frame.date_time_colour,
        );
    }

    watch.session().disconnect()?;
    phone.session().disconnect()?;
    watch_task.abort();
    phone_task.abort();

    network.store().flush()?;
    Ok(())
}

// ============================================================================
// ENCODE / DECODE
// ============================================================================

fn parse_field(spec: &str) -> Result<(String, FieldValue), CliError> {
    let (key, typed) = spec
        .split_once('=')
        .ok_or_else(|| CliError::FieldSyntax(spec.to_string()))?;
    let (kind, value) = typed
        .split_once(':')
        .ok_or_else(|| CliError::FieldSyntax(spec.to_string()))?;

    let value = match kind {
        "str" => FieldValue::Str(value.to_string()),
        "int" => FieldValue::Int(
            value
                .parse()
                .map_err(|_| CliError::FieldNumber(spec.to_string()))?,
        ),
        "long" => FieldValue::Long(
            value
                .parse()
                .map_err(|_| CliError::FieldNumber(spec.to_string()))?,
        ),
        other => return Err(CliError::FieldType(other.to_string())),
    };
    Ok((key.to_string(), value))
}

fn run_encode(fields: &[String], base64: bool) -> Result<(), CliError> {
    let fields = fields
        .iter()
        .map(|spec| parse_field(spec))
        .collect::<Result<Vec<_>, _>>()?;
    let payload = Payload::from_fields(fields)?;

    let encoded = if base64 {
        PayloadCodec::encode_base64(&payload)?
    } else {
        PayloadCodec::encode_hex(&payload)?
    };
    println!("{}", encoded);
    Ok(())
}

fn run_decode(input: &str, base64: bool) -> Result<(), CliError> {
    let payload = if base64 {
        PayloadCodec::decode_base64(input.trim())?
    } else {
        PayloadCodec::decode_hex(input.trim())?
    };

    for (key, value) in payload.iter() {
        println!("{} ({}) = {}", key, value.type_name(), value);
    }
    Ok(())
}
