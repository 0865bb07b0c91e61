use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
mod auth;
use ssec_fetch::{
    EncryptedObjects, GetObjectOptions, HttpClient, LocalStore, ObjectClient, default_store,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

fn resolve_store(path: Option<PathBuf>) -> Result<LocalStore> {
    match path {
        Some(p) => Ok(LocalStore::new(p)),
        None => default_store(),
    }
}

fn resolve_client(
    endpoint: Option<&str>,
    store: Option<PathBuf>,
) -> Result<Box<dyn ObjectClient>> {
    match endpoint {
        Some(endpoint) => Ok(Box::new(HttpClient::new(endpoint)?)),
        None => Ok(Box::new(resolve_store(store)?)),
    }
}

#[derive(Debug, Parser)]
#[command(name = "ssec-fetch")]
#[command(
    version,
    about = "Fetch SSE-C encrypted objects using a password-derived key."
)]
struct Cli {
    /// S3-compatible endpoint, e.g. https://play.min.io
    #[arg(long, global = true, value_name = "URL", env = "SSEC_ENDPOINT")]
    endpoint: Option<String>,

    /// Directory of the local object store, used when no endpoint is set
    #[arg(long, global = true, value_name = "DIR", env = "SSEC_STORE")]
    store: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Retrieves an encrypted object
    #[command(arg_required_else_help = true)]
    Get {
        bucket: String,
        object: String,

        /// Write the object to this file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Stores a file as an encrypted object in the local store
    #[command(arg_required_else_help = true)]
    Put {
        bucket: String,
        object: String,
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Cli::parse();
    match args.command {
        Commands::Get {
            bucket,
            object,
            output,
        } => {
            let password = auth::read_password()?;
            let client = resolve_client(args.endpoint.as_deref(), args.store)?;
            let opts = GetObjectOptions {
                timeout: args.timeout.map(Duration::from_secs),
                ..GetObjectOptions::default()
            };

            match output {
                Some(path) => {
                    client.fget_encrypted_object_with_options(
                        &bucket, &object, &path, &password, opts,
                    )?;
                    println!("saved '{bucket}/{object}' to {}", path.display());
                }
                None => {
                    let mut reader = client
                        .get_encrypted_object_with_options(&bucket, &object, &password, opts)?;
                    let mut stdout = io::stdout().lock();
                    io::copy(&mut reader, &mut stdout)?;
                    stdout.flush()?;
                }
            }
        }
        Commands::Put {
            bucket,
            object,
            file,
        } => {
            if args.endpoint.is_some() {
                bail!("put is only supported for the local store");
            }
            let password = auth::read_new_password_with_confirmation()?;
            let store = resolve_store(args.store)?;
            let data = std::fs::read(&file)
                .with_context(|| format!("failed to read '{}'", file.display()))?;

            store.make_bucket(&bucket)?;
            store.put_encrypted_object(&bucket, &object, &data, &password)?;
            println!("stored '{bucket}/{object}'");
        }
    }

    Ok(())
}
