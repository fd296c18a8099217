use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "irx")]
#[command(about = "Record reconciliation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a JSON batch file against the database
    Reconcile {
        /// Batch file: {"<entity_type>": [ {record}, ... ], ...}
        #[arg(long)]
        input: String,

        /// Registry YAML paths in merge order (default: built-in registry)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Append every outcome to this JSONL journal
        #[arg(long)]
        journal: Option<String>,

        /// Write the journal without hash chaining
        #[arg(long = "no-hash-chain", default_value_t = false)]
        no_hash_chain: bool,

        /// Print the full report as JSON instead of key=value lines
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Exit non-zero if any record failed
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Entity registry commands
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Outcome journal utilities
    Journal {
        #[command(subcommand)]
        cmd: JournalCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Validate the registry and list its entity types
    Check {
        /// Paths in merge order (base -> overrides)
        paths: Vec<String>,
    },

    /// Print the registry hash and canonical JSON
    Hash {
        paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity plus presence of every registered table
    Status {
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum JournalCmd {
    /// Verify sequence and hash chain of a journal file
    Verify {
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Reconcile {
            input,
            config_paths,
            journal,
            no_hash_chain,
            json,
            strict,
        } => {
            commands::reconcile::run(commands::reconcile::ReconcileArgs {
                input,
                config_paths,
                journal,
                hash_chain: !no_hash_chain,
                json,
                strict,
            })
            .await?;
        }

        Commands::Config { cmd } => match cmd {
            ConfigCmd::Check { paths } => {
                let loaded = commands::load_registry(&paths)?;
                println!("config_ok=true entity_types={}", loaded.registry.len());
                for (name, schema) in loaded.registry.iter() {
                    println!(
                        "entity={} unique_keys={} excluded={} structured={}",
                        name,
                        schema.unique_keys().join(","),
                        join_set(schema.excluded_fields()),
                        join_set(schema.structured_fields()),
                    );
                }
                println!("config_hash={}", loaded.config_hash);
            }
            ConfigCmd::Hash { paths } => {
                let loaded = commands::load_registry(&paths)?;
                println!("config_hash={}", loaded.config_hash);
                println!("{}", loaded.canonical_json);
            }
        },

        Commands::Db { cmd } => match cmd {
            DbCmd::Status { config_paths } => {
                let loaded = commands::load_registry(&config_paths)?;
                let pool = irx_db::connect_from_env().await?;
                let s = irx_db::status(&pool, loaded.registry.entity_types()).await?;
                println!("db_ok={}", s.ok);
                for (table, exists) in &s.tables {
                    println!("table={} exists={}", table, exists);
                }
            }
        },

        Commands::Journal { cmd } => match cmd {
            JournalCmd::Verify { path } => match irx_audit::verify_hash_chain(&path)? {
                irx_audit::VerifyResult::Valid { lines } => {
                    println!("journal_valid=true lines={}", lines);
                }
                irx_audit::VerifyResult::Broken { line, reason } => {
                    println!("journal_valid=false line={}", line);
                    anyhow::bail!("JOURNAL_BROKEN at line {line}: {reason}");
                }
            },
        },
    }

    Ok(())
}

fn join_set(s: &std::collections::BTreeSet<String>) -> String {
    s.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
