/*!
 * Chute CLI - pipe a stream into S3-compatible object storage
 */

use clap::Parser;
use chute::{
    cli_style::{self, render_event, starting_line},
    config::{english_join, LogConfig, UploadConfig, MIB},
    error::{Result, UploadError, EXIT_FAILED, EXIT_SUCCESS},
    logging, MultipartUpload, UploadEvent,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;

/// Endpoint that selects the SDK's regional AWS resolution
const AWS_ENDPOINT: &str = "s3.amazonaws.com";

const LONG_ABOUT: &str = "\
A multipart uploader for Amazon S3, DigitalOcean Spaces, and S3-compatible systems.

Example:

    cat dump.rdb | gzip | chute --bucket backups --path dump.rdb.gz

ACCESS_KEY and SECRET_KEY must be set in the environment. ENDPOINT and REGION
can also be set in the environment, but corresponding flags take precedence.
If you're using AWS you don't need to set the endpoint.";

#[derive(Parser)]
#[command(name = "chute")]
#[command(
    version,
    about = "An S3 multipart uploader",
    long_about = LONG_ABOUT,
    override_usage = "INPUT | chute [OPTIONS]\n       chute [OPTIONS] < INPUT",
    disable_version_flag = true
)]
struct Cli {
    /// The endpoint to upload to [default: s3.amazonaws.com]
    #[arg(short = 'e', long, env = "ENDPOINT")]
    endpoint: Option<String>,

    /// The region to use; AWS only [default: us-east-1]
    #[arg(short = 'r', long, env = "REGION")]
    region: Option<String>,

    /// The bucket/space to upload to
    #[arg(short = 'b', long)]
    bucket: Option<String>,

    /// The remote path at which the object is stored
    #[arg(short = 'p', long)]
    path: Option<String>,

    /// The maximum number of attempts per part [default: 3]
    #[arg(short = 't', long)]
    retries: Option<u32>,

    /// The maximum size per part, in megabytes [default: 5]
    #[arg(short = 'm', long = "part-size", value_name = "MB")]
    part_size: Option<usize>,

    /// Silence output, except errors
    #[arg(short = 's', long)]
    silent: bool,

    /// TOML file with upload defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug-level diagnostics on stderr
    #[arg(long)]
    verbose: bool,

    /// Write JSON diagnostics to a file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[arg(long, env = "ACCESS_KEY", hide = true, hide_env_values = true)]
    access_key: Option<String>,

    #[arg(long, env = "SECRET_KEY", hide = true, hide_env_values = true)]
    secret_key: Option<String>,

    /// Output version information
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    version: Option<bool>,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            cli_style::print_error(&e.to_string());
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    logging::init_logging(&LogConfig {
        log_file: cli.log_file.clone(),
        verbose: cli.verbose,
        ..Default::default()
    })?;

    let base = match cli.config {
        Some(ref path) => UploadConfig::from_file(path)?,
        None => UploadConfig::default(),
    };
    let silent = cli.silent;
    let (config, key) = resolve(cli, base)?;

    if std::io::stdin().is_terminal() {
        return Err(UploadError::Configuration(
            "input must be through a pipe".to_string(),
        ));
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| UploadError::TaskFailed(format!("failed to start runtime: {}", e)))?;

    runtime.block_on(async {
        let upload = MultipartUpload::s3(config).await;
        let started = Instant::now();

        if !silent {
            println!("{}", starting_line());
        }

        let mut events = upload.send(tokio::io::stdin(), key);
        let mut code = EXIT_FAILED;

        while let Some(event) = events.recv().await {
            if let Some(line) = render_event(&event, silent, started.elapsed()) {
                match event {
                    UploadEvent::Error(_) => eprintln!("{}", line),
                    _ => println!("{}", line),
                }
            }
            if let UploadEvent::Complete { .. } = event {
                code = EXIT_SUCCESS;
            }
        }

        Ok(code)
    })
}

/// Merge flags and environment over the file config and check for gaps
fn resolve(cli: Cli, mut config: UploadConfig) -> Result<(UploadConfig, String)> {
    let mut missing = Vec::new();

    match cli.endpoint.as_deref() {
        Some("") => missing.push("endpoint"),
        Some(AWS_ENDPOINT) => config.endpoint = None,
        Some(endpoint) => config.endpoint = Some(endpoint.to_string()),
        None => {}
    }

    if let Some(region) = cli.region {
        config.region = region;
    }
    if config.region.is_empty() {
        missing.push("region");
    }

    if let Some(bucket) = cli.bucket {
        config.bucket = bucket;
    }
    if config.bucket.is_empty() {
        missing.push("bucket");
    }

    let key = cli.path.unwrap_or_default();
    if key.is_empty() {
        missing.push("path");
    }

    if !missing.is_empty() {
        return Err(UploadError::Configuration(format!(
            "missing {}",
            english_join(&missing)
        )));
    }

    if let Some(access_key) = cli.access_key {
        config.access_key = Some(access_key);
    }
    if let Some(secret_key) = cli.secret_key {
        config.secret_key = Some(secret_key);
    }
    if let Some(retries) = cli.retries {
        config.max_retries = retries;
    }
    if let Some(part_size) = cli.part_size {
        config.max_part_size = part_size.saturating_mul(MIB);
    }

    config.validate(&key)?;
    Ok((config, key))
}
