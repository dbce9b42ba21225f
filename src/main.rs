use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use clap::{Parser, Subcommand};
use coffer::{Coffer, CofferError, DirStore, ErrorKind, KdfHash, KdfParams, default_store};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

mod auth;

#[derive(Debug, clap::Args)]
struct KdfArgs {
    /// PBKDF2 iteration count (default: 10000)
    #[arg(long = "kdf-iterations", global = true, env = "COFFER_KDF_ITERATIONS")]
    iterations: Option<u32>,

    /// PBKDF2 hash function: sha256 or sha512 (default: sha256)
    #[arg(long = "kdf-hash", global = true, env = "COFFER_KDF_HASH")]
    hash: Option<KdfHash>,
}

impl KdfArgs {
    fn to_kdf_params(&self) -> Result<KdfParams> {
        let default = KdfParams::default();

        Ok(KdfParams::new(
            self.hash.unwrap_or(default.hash()),
            self.iterations.unwrap_or(default.iterations()),
            default.key_len(),
        )?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "coffer")]
#[command(
    version,
    about = "Password-protected secret repositories with envelope encryption."
)]
struct Cli {
    /// Directory of the coffer store
    #[arg(long, global = true, value_name = "DIR", env = "COFFER_STORE")]
    store: Option<PathBuf>,

    /// Repository id
    #[arg(long, global = true, value_name = "ID", env = "COFFER_REPO")]
    repo: Option<String>,

    /// User account id
    #[arg(long, global = true, value_name = "ID", env = "COFFER_USER")]
    user: Option<String>,

    /// Log filter, e.g. `coffer=debug` (overrides RUST_LOG)
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(flatten)]
    kdf: KdfArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates a repository and its administrator account
    Create {
        /// Label of the new repository
        #[arg(long, default_value = "main")]
        repo_label: String,

        /// Label of the administrator account
        #[arg(long, default_value = "admin")]
        user_label: String,
    },

    /// Retrieves a secret by name
    #[command(arg_required_else_help = true)]
    Get {
        name: String,

        /// Print the secret base64-encoded
        #[arg(long, default_value_t = false)]
        base64: bool,
    },

    /// Stores or replaces a secret by name
    #[command(arg_required_else_help = true)]
    Set { name: String, value: String },

    /// Lists secret names
    List,

    /// Shows information about the repository
    Info,
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(f) => EnvFilter::new(f),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("coffer=warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn resolve_store(path: Option<PathBuf>) -> Result<DirStore> {
    match path {
        Some(p) => Ok(DirStore::new(p)),
        None => default_store(),
    }
}

fn required(value: Option<String>, what: &str, flag: &str, env: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("no {what} given (use {flag} or {env})"),
    }
}

fn encode_base64(secret: &[u8]) -> Zeroizing<String> {
    Zeroizing::new(STANDARD.encode(secret))
}

/// Everything needed to unlock a repository for one command.
struct Session {
    coffer: Coffer,
    repo: String,
    user: String,
    password: Zeroizing<String>,
}

fn open(
    store: DirStore,
    kdf: KdfParams,
    repo: Option<String>,
    user: Option<String>,
) -> Result<Session> {
    if !store.exists() {
        bail!("coffer store does not exist");
    }
    let repo = required(repo, "repository id", "--repo", "COFFER_REPO")?;
    let user = required(user, "user id", "--user", "COFFER_USER")?;
    let password = auth::read_password()?;

    Ok(Session {
        coffer: Coffer::with_kdf(store, kdf),
        repo,
        user,
        password,
    })
}

fn run(args: Cli) -> Result<()> {
    let kdf = args.kdf.to_kdf_params()?;
    let store = resolve_store(args.store)?;

    match args.command {
        Commands::Create {
            repo_label,
            user_label,
        } => {
            let password = auth::read_new_password()?;
            let coffer = Coffer::with_kdf(store, kdf);
            let (repo_id, user_id) = coffer
                .create_repository(&repo_label, &user_label, &password)
                .context("failed to create repository")?;
            println!("repository created");
            println!("repository: {repo_id}");
            println!("user:       {user_id}");
            coffer.close()?;
        }
        Commands::Get { name, base64 } => {
            let s = open(store, kdf, args.repo, args.user)?;
            let secret = s.coffer.read_secret(&s.repo, &s.user, &s.password, &name)?;
            let mut stdout = io::stdout().lock();
            if base64 {
                writeln!(stdout, "{}", encode_base64(&secret).as_str())?;
            } else {
                stdout.write_all(&secret)?;
                writeln!(stdout)?;
            }
        }
        Commands::Set { name, value } => {
            let value = Zeroizing::new(value);
            let s = open(store, kdf, args.repo, args.user)?;
            s.coffer
                .write_secret(&s.repo, &s.user, &s.password, &name, value.as_bytes())?;
            println!("stored secret '{name}'");
            s.coffer.close()?;
        }
        Commands::List => {
            let s = open(store, kdf, args.repo, args.user)?;
            let names = s.coffer.list_secret_names(&s.repo, &s.user, &s.password)?;
            if names.is_empty() {
                println!("No secrets stored.");
            }
            for name in names {
                println!("{name}");
            }
        }
        Commands::Info => {
            let s = open(store, kdf, args.repo, args.user)?;
            let info = s.coffer.describe(&s.repo, &s.user, &s.password)?;
            println!("{info}");
        }
    }

    Ok(())
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::NotFound => 2,
        ErrorKind::Forbidden => 3,
        ErrorKind::InvalidCredentials => 4,
        _ => 1,
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    init_tracing(args.log_level.as_deref());

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<CofferError>() {
            Some(e) => {
                eprintln!("error: {}", e.public_message());
                ExitCode::from(exit_code(e.kind()))
            }
            None => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}
