// soma_photo - BODY organ daemon
// Photo metadata and upload organization service accessible via Unix Domain Socket

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use soma_photo::organ::{Organ, PhotoOrgan, Response, Stimulus};
use soma_photo::{extract_metadata, PhotoConfig};

#[derive(Parser)]
#[command(name = "soma_photo", version, about = "SOMA Photo Daemon - EXIF Metadata Organ")]
struct Args {
    /// JSON policy file (upload dir, size limit, naming and duplicate policy)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve stimuli over a Unix socket
    Serve {
        /// Unix socket path for UDS server
        #[arg(long, default_value = "/tmp/soma_photo.sock")]
        socket_path: String,

        /// Override the configured upload directory
        #[arg(long)]
        upload_dir: Option<PathBuf>,
    },
    /// Print the metadata of image files as JSON lines
    Inspect {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PhotoConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PhotoConfig::default(),
    };

    match args.command {
        Command::Serve { socket_path, upload_dir } => {
            let config = PhotoConfig {
                upload_dir: upload_dir.unwrap_or(config.upload_dir),
                ..config
            };
            serve(&socket_path, &config).await
        }
        Command::Inspect { paths } => inspect(&paths, &config),
    }
}

async fn serve(socket_path: &str, config: &PhotoConfig) -> Result<()> {
    info!("📷 Starting SOMA Photo Daemon");
    info!("   Socket: {}", socket_path);

    // Track startup time for health checks
    let start_time = std::time::Instant::now();

    let organ = Arc::new(PhotoOrgan::new(config).context("Failed to open upload store")?);

    info!("   ✓ Upload store at {}", config.upload_dir.display());

    // Remove old socket if exists
    let socket = PathBuf::from(socket_path);
    if socket.exists() {
        std::fs::remove_file(&socket)
            .context("Failed to remove old socket")?;
    }

    let listener = UnixListener::bind(&socket)
        .context("Failed to bind Unix socket")?;

    info!("   ✓ Listening on {}", socket_path);

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let organ = Arc::clone(&organ);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, organ, start_time).await {
                        error!("Connection error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Accept error: {}", e);
            }
        }
    }
}

/// Handle a single UDS connection
async fn handle_connection(
    mut stream: UnixStream,
    organ: Arc<PhotoOrgan>,
    start_time: std::time::Instant,
) -> Result<()> {
    let mut buffer = vec![0u8; 65536]; // 64KB buffer

    loop {
        // Read request length (4 bytes)
        let mut len_buf = [0u8; 4];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                debug!("Client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > buffer.len() {
            buffer.resize(len, 0);
        }

        stream.read_exact(&mut buffer[..len]).await?;

        let stimulus: Stimulus = serde_json::from_slice(&buffer[..len])
            .context("Failed to parse stimulus")?;

        debug!("Received: op={}", stimulus.op);

        // Health checks bypass the organ
        let response = if stimulus.op == "health" || stimulus.op == "health.check" {
            Response {
                ok: true,
                output: serde_json::json!({
                    "status": "healthy",
                    "organ": "soma_photo",
                    "version": env!("CARGO_PKG_VERSION"),
                    "uptime_ms": start_time.elapsed().as_millis() as u64,
                }),
                latency_ms: 0,
                cost: None,
            }
        } else {
            match organ.stimulate(stimulus).await {
                Ok(resp) => resp,
                Err(e) => {
                    error!("Stimulate error: {:?}", e);
                    Response {
                        ok: false,
                        output: serde_json::json!({
                            "error": e.to_string()
                        }),
                        latency_ms: 0,
                        cost: None,
                    }
                }
            }
        };

        let response_bytes = serde_json::to_vec(&response)
            .context("Failed to serialize response")?;

        // Write response length + body
        let len_bytes = (response_bytes.len() as u32).to_be_bytes();
        stream.write_all(&len_bytes).await?;
        stream.write_all(&response_bytes).await?;
        stream.flush().await?;

        debug!("Sent: ok={}, latency={}ms", response.ok, response.latency_ms);
    }
}

/// Print one JSON line per image; directories are scanned one level deep
fn inspect(paths: &[PathBuf], config: &PhotoConfig) -> Result<()> {
    let options = config.extract_options();

    for path in paths {
        for file in image_files(path, config)? {
            let metadata = extract_metadata(&file, &options);
            println!("{}", serde_json::to_string(&metadata)?);
        }
    }
    Ok(())
}

fn image_files(path: &Path, config: &PhotoConfig) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)
        .with_context(|| format!("Failed to read directory {}", path.display()))?
    {
        let file = entry?.path();
        let allowed = file
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| config.is_allowed_extension(e));
        if file.is_file() && allowed {
            files.push(file);
        } else {
            debug!("Skipping {}", file.display());
        }
    }

    if files.is_empty() {
        warn!("No images found in {}", path.display());
    }
    files.sort();
    Ok(files)
}
