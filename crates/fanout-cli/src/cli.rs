use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fanout",
    about = "Route and fan out content items into sharded feeds",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse destination addresses into routes
    Parse(ParseArgs),
    /// Show the sharded store path of ids
    Shard(ShardArgs),
    /// Deliver one message through an in-memory engine
    Deliver(DeliverArgs),
}

#[derive(Args)]
pub struct ParseArgs {
    /// Addresses such as `smtp:a@b.org` or `alice`
    #[arg(required = true)]
    pub addresses: Vec<String>,
}

#[derive(Args)]
pub struct ShardArgs {
    #[arg(required = true)]
    pub ids: Vec<String>,
    #[arg(long, default_value = "/feeds")]
    pub root: String,
    #[arg(long, default_value_t = 3)]
    pub depth: usize,
    #[arg(long, default_value_t = 2)]
    pub width: usize,
}

#[derive(Args)]
pub struct DeliverArgs {
    /// TOML engine configuration; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Destination addresses
    #[arg(long, required = true, num_args = 1..)]
    pub to: Vec<String>,
    /// User the message is delivered on behalf of
    #[arg(long)]
    pub actor: Option<String>,
    /// Message id
    #[arg(long, default_value = "msg-1")]
    pub id: String,
    /// Topic marker resolved by the topic router
    #[arg(long)]
    pub topic: Option<String>,
    #[arg(long, default_value = "")]
    pub subject: String,
}
