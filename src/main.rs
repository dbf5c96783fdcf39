use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pdf2speech::{
    api,
    config::{CHUNK_SIZE_RANGE, Config, ConfigError},
    document::{Document, load_document, output_file_name, render_output},
    logging,
    processing::DocumentService,
    rewrite::{GeminiClient, RemoteError, RewriteClient},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use time::OffsetDateTime;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "pdf2speech",
    version,
    about = "Rewrite PDF documents into text optimized for text-to-speech"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, and rewrite a document, writing `<stem>_tts-optimized.txt`.
    Process {
        /// PDF or plain-text file to rewrite.
        input: PathBuf,
        /// Output file; defaults to `<stem>_tts-optimized.txt` next to the input.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Override the per-chunk token budget.
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Print content statistics and the chunk plan without calling the model.
    Analyze {
        /// PDF or plain-text file to analyze.
        input: PathBuf,
        /// Override the per-chunk token budget.
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// Serve the HTTP API.
    Serve,
    /// Send a probe prompt to verify the API key and model.
    TestConnection,
    /// List models available to the configured API key.
    Models,
}

#[tokio::main]
async fn main() {
    logging::init_tracing();
    if let Err(err) = run().await {
        tracing::error!(error = %format!("{err:#}"), "Command failed");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    match cli.command {
        Command::Process {
            input,
            output,
            chunk_size,
        } => process(with_chunk_size(config, chunk_size)?, input, output).await,
        Command::Analyze { input, chunk_size } => {
            analyze(with_chunk_size(config, chunk_size)?, input).await
        }
        Command::Serve => serve(config).await,
        Command::TestConnection => {
            let client = GeminiClient::from_config(&config)?;
            let reply = client
                .test_connection()
                .await
                .context("connection test failed")?;
            println!("{}", reply.trim());
            Ok(())
        }
        Command::Models => {
            let client = GeminiClient::from_config(&config)?;
            for model in client.list_models().await? {
                match model.display_name {
                    Some(display) => println!("{}\t{}", model.name, display),
                    None => println!("{}", model.name),
                }
            }
            Ok(())
        }
    }
}

fn with_chunk_size(mut config: Config, chunk_size: Option<usize>) -> Result<Config> {
    if let Some(size) = chunk_size {
        if !CHUNK_SIZE_RANGE.contains(&size) {
            bail!(
                "--chunk-size must be between {} and {}",
                CHUNK_SIZE_RANGE.start(),
                CHUNK_SIZE_RANGE.end()
            );
        }
        config.chunk_size = size;
    }
    Ok(config)
}

async fn load(input: &Path) -> Result<Document> {
    load_document(input)
        .await
        .with_context(|| format!("failed to load {}", input.display()))
}

async fn process(config: Config, input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let service = DocumentService::from_config(Arc::new(config))?;
    let document = load(&input).await?;
    tracing::info!(
        source = %document.metadata().source_name,
        pages = document.metadata().page_count,
        progress = 10,
        "Loaded document"
    );

    let outcome = service.rewrite_document(&document).await?;
    let rendered = render_output(
        &outcome.source_name,
        &outcome.text,
        OffsetDateTime::now_utc(),
    );
    let target =
        output.unwrap_or_else(|| input.with_file_name(output_file_name(&outcome.source_name)));
    tokio::fs::write(&target, rendered)
        .await
        .with_context(|| format!("failed to write {}", target.display()))?;

    tracing::info!(
        output = %target.display(),
        chunks = outcome.chunk_count,
        rewritten = outcome.rewritten,
        fallbacks = outcome.fallbacks,
        "Wrote optimized text"
    );
    println!("{}", target.display());
    Ok(())
}

async fn analyze(config: Config, input: PathBuf) -> Result<()> {
    let service = DocumentService::new(Arc::new(config), Arc::new(Unconfigured));
    let document = load(&input).await?;
    let plan = service.plan(document.text());
    let report = serde_json::json!({
        "source_name": document.metadata().source_name,
        "page_count": document.metadata().page_count,
        "plan": plan,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    let server_port = config.server_port;
    let service = Arc::new(DocumentService::from_config(Arc::new(config))?);
    let app = api::create_router(service);

    let (listener, port) = bind_listener(server_port)
        .await
        .context("failed to bind listener")?;
    tracing::info!("Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Rewrite client for commands that only plan chunks and never call the model.
struct Unconfigured;

#[async_trait::async_trait]
impl RewriteClient for Unconfigured {
    async fn rewrite(
        &self,
        _text: &str,
        _index: usize,
        _total: usize,
    ) -> Result<String, RemoteError> {
        Err(ConfigError::MissingVariable("GEMINI_API_KEY".into()).into())
    }
}

async fn bind_listener(server_port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = server_port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 4100..=4199;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 4100-4199",
    ))
}
