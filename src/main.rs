//! Crudgate command line
//!
//! Compiles CRUD request files into parameterized SQL for inspection.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crudgate::common::{CreateRequest, DeleteRequest, GatewayConfig, ReadRequest, UpdateRequest};
use crudgate::sql::{CompiledQuery, SqlCompiler};

#[derive(Parser, Debug)]
#[command(name = "crudgate")]
#[command(about = "Crudgate CRUD compiler and rule engine", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "crudgate.toml", env = "CRUDGATE_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a request file and print the statement and its parameters
    Compile {
        /// CRUD operation to compile
        #[arg(long, value_enum)]
        op: Operation,

        /// Update operator, required for updates
        #[arg(long, default_value = "$set")]
        operator: String,

        /// Project (schema) the table lives in; defaults to the configured project
        #[arg(long)]
        project: Option<String>,

        /// Target table
        #[arg(long)]
        table: String,

        /// JSON file holding the request body
        #[arg(long)]
        request: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Operation {
    Update,
    Read,
    Create,
    Delete,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("Crudgate v{}", env!("CARGO_PKG_VERSION"));

    let config = if args.config.exists() {
        GatewayConfig::load(&args.config).await?
    } else {
        info!("Using default configuration");
        GatewayConfig::default()
    };

    match args.command {
        Command::Compile {
            op,
            operator,
            project,
            table,
            request,
        } => {
            let compiler = SqlCompiler::from_config(&config.sql)?;
            let project = project.unwrap_or_else(|| config.project.id.clone());
            let body = tokio::fs::read_to_string(&request).await?;

            let compiled = compile(&compiler, op, &operator, &project, &table, &body)?;
            println!("{}", compiled.statement);
            println!("{}", serde_json::to_string(&compiled.params)?);
        }
    }

    Ok(())
}

fn compile(
    compiler: &SqlCompiler,
    op: Operation,
    operator: &str,
    project: &str,
    table: &str,
    body: &str,
) -> anyhow::Result<CompiledQuery> {
    let compiled = match op {
        Operation::Update => {
            let request: UpdateRequest = serde_json::from_str(body)?;
            compiler.compile_update(project, table, &request, operator)?
        }
        Operation::Read => {
            let request: ReadRequest = serde_json::from_str(body)?;
            compiler.compile_read(project, table, &request)?
        }
        Operation::Create => {
            let request: CreateRequest = serde_json::from_str(body)?;
            compiler.compile_create(project, table, &request)?
        }
        Operation::Delete => {
            let request: DeleteRequest = serde_json::from_str(body)?;
            compiler.compile_delete(project, table, &request)?
        }
    };
    Ok(compiled)
}
