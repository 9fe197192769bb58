use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use aws_iam_role_connector::connector::IamRoleConnector;
use aws_iam_role_connector_core::connector::{Connector, DiagnosticSeverity};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aws-iam-role-connector")]
#[command(about = "Manage AWS IAM roles from RON documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Repository root holding `aws/config.ron` and `aws/iam/roles/*.ron`
    #[arg(long, env = "AWS_IAM_ROLE_CONNECTOR_PREFIX", default_value = ".")]
    prefix: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List role addresses in the account
    List {
        #[arg(long, default_value = "")]
        subpath: PathBuf,
    },

    /// Print the live document and outputs of a role
    Get { addr: PathBuf },

    /// Show the ops that would bring a role to its document in the repository
    Plan { addr: PathBuf },

    /// Plan and execute
    Apply { addr: PathBuf },

    /// Write live roles into the repository
    Import {
        #[arg(long, default_value = "")]
        subpath: PathBuf,

        /// Replace documents that already exist
        #[arg(long)]
        overwrite: bool,
    },

    /// Check a role document without contacting AWS
    Validate { addr: PathBuf },

    /// Print an example role document
    Skeleton,
}

async fn read_desired(prefix: &Path, addr: &Path) -> anyhow::Result<Option<Vec<u8>>> {
    let path = prefix.join(addr);
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?,
    ))
}

async fn plan(connector: &IamRoleConnector, prefix: &Path, addr: &Path) -> anyhow::Result<Vec<String>> {
    if !connector.filter(addr).await? {
        bail!("{:?} is not an IAM role address", addr);
    }

    let current = connector.get(addr).await?.map(|out| out.resource_definition);
    let desired = read_desired(prefix, addr).await?;

    let mut ops = Vec::new();
    for op in connector.plan(addr, current, desired).await? {
        if let Some(message) = op.friendly_message {
            println!("{}", message);
        }
        ops.push(op.op_definition);
    }
    if ops.is_empty() {
        println!("{:?} is up to date", addr);
    }
    Ok(ops)
}

async fn validate(prefix: &Path, addr: &Path) -> anyhow::Result<()> {
    let body = read_desired(prefix, addr)
        .await?
        .with_context(|| format!("No document at {:?}", prefix.join(addr)))?;

    let diag = IamRoleConnector::validate(addr, &body)?;
    for d in &diag.diagnostics {
        let severity = match d.severity {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        };
        match d.field {
            Some(ref field) => println!("{}: {}: {}", severity, field, d.message),
            None => println!("{}: {}", severity, d.message),
        }
    }

    if diag.has_errors() {
        bail!("{:?} is invalid", addr);
    }
    Ok(())
}

fn skeleton() -> anyhow::Result<()> {
    for skeleton in IamRoleConnector::skeletons()? {
        println!("// {}", skeleton.addr.display());
        println!("{}", String::from_utf8(skeleton.body)?);
    }
    Ok(())
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let prefix = cli.prefix.as_path();

    let connector = match cli.command {
        Commands::Validate { ref addr } => return validate(prefix, addr).await,
        Commands::Skeleton => return skeleton(),
        _ => IamRoleConnector::new(prefix).await?,
    };
    tracing::info!(account_id = connector.account_id(), "Connected to IAM");

    match cli.command {
        Commands::List { subpath } => {
            for addr in connector.list(&subpath).await? {
                println!("{}", addr.display());
            }
        }
        Commands::Get { addr } => match connector.get(&addr).await? {
            Some(out) => {
                println!("{}", String::from_utf8(out.resource_definition)?);
                let mut outputs: Vec<_> = out.outputs.unwrap_or_default().into_iter().collect();
                outputs.sort();
                for (key, value) in outputs {
                    println!("// {} = {}", key, value.unwrap_or_default());
                }
            }
            None => println!("{:?} does not exist", addr),
        },
        Commands::Plan { addr } => {
            plan(&connector, prefix, &addr).await?;
        }
        Commands::Apply { addr } => {
            for op in plan(&connector, prefix, &addr).await? {
                let out = connector.op_exec(&addr, &op).await?;
                if let Some(message) = out.friendly_message {
                    println!("{}", message);
                }
            }
        }
        Commands::Import { subpath, overwrite } => {
            let imported = connector.do_import(prefix, &subpath, overwrite).await?;
            println!("Imported {} roles", imported.len());
        }
        Commands::Validate { .. } | Commands::Skeleton => {}
    }

    Ok(())
}
