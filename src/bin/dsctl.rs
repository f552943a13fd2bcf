use std::io::Write;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use sled_datastore::kv_store::SledStore;
use sled_datastore::{Configuration, Datastore, Key, Query};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
    /// datastore directory, takes precedence over the configuration file
    #[arg(short, long)]
    path: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Has { key: String },
    Size { key: String },
    Delete { key: String },
    Query {
        #[arg(long, default_value_t = String::new())]
        prefix: String,
        #[arg(long, default_value_t = false)]
        keys_only: bool,
        #[arg(long, default_value_t = 0)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Disk usage in bytes
    Du {
        #[arg(long, default_value_t = false)]
        with_wal: bool,
    },
}

fn run(mut ds: Datastore<SledStore>, command: Command) -> Result<()> {
    let ret = execute(&mut ds, command);
    let closed = ds
        .close()
        .inspect_err(|e| error!("failed to close datastore, err: {e}"));
    ret?;
    closed?;
    Ok(())
}

fn execute(ds: &mut Datastore<SledStore>, command: Command) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match command {
        Command::Put { key, value } => ds.put(&Key::new(key), value.as_bytes())?,
        Command::Get { key } => {
            let value = ds.get(&Key::new(key))?;
            out.write_all(&value)?;
            writeln!(out)?;
        }
        Command::Has { key } => writeln!(out, "{}", ds.has(&Key::new(key))?)?,
        Command::Size { key } => writeln!(out, "{}", ds.get_size(&Key::new(key))?)?,
        Command::Delete { key } => ds.delete(&Key::new(key))?,
        Command::Query {
            prefix,
            keys_only,
            limit,
            offset,
        } => {
            let q = Query::builder()
                .prefix(prefix)
                .keys_only(keys_only)
                .limit(limit)
                .offset(offset)
                .build();
            for entry in ds.query(q)? {
                match entry.value {
                    Some(v) => writeln!(out, "{}\t{}", entry.key, String::from_utf8_lossy(&v))?,
                    None => writeln!(out, "{}", entry.key)?,
                }
            }
        }
        Command::Du { with_wal } => {
            if with_wal {
                ds.set_wal_reporting(true);
            }
            writeln!(out, "{}", ds.disk_usage()?)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let conf = Configuration::load(args.config.as_deref(), args.path.as_deref())
        .inspect_err(|e| error!("bad configuration, err: {e}"))?;

    let ds = Datastore::open(&conf).inspect_err(|e| error!("failed to open datastore, err: {e}"))?;
    run(ds, args.command)
}
