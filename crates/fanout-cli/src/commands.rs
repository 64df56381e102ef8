use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;

use fanout_delivery::{DeliveryOutcome, FanoutConfig, FanoutEngine};
use fanout_store::{ContentStore, InMemoryContentStore, ShardedPathResolver};
use fanout_transport::RouteOutcome;
use fanout_types::{parse_address, props, ContentItem};

use crate::cli::*;

const MESSAGES_ROOT: &str = "/messages";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Parse(args) => cmd_parse(args, cli.format),
        Command::Shard(args) => cmd_shard(args, cli.format),
        Command::Deliver(args) => cmd_deliver(args, cli.format),
    }
}

fn cmd_parse(args: ParseArgs, format: OutputFormat) -> anyhow::Result<()> {
    let routes: Vec<_> = args.addresses.iter().map(|a| parse_address(a)).collect();
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&routes)?);
        return Ok(());
    }
    for (raw, route) in args.addresses.iter().zip(&routes) {
        match (route.transport(), route.recipient()) {
            (Some(t), Some(r)) => println!("{:<24} {} {}", raw, t.cyan(), r.bold()),
            _ => println!("{:<24} {}", raw, "no route".dimmed()),
        }
    }
    Ok(())
}

fn cmd_shard(args: ShardArgs, format: OutputFormat) -> anyhow::Result<()> {
    let resolver = ShardedPathResolver::new(args.depth, args.width)?;
    let paths: Vec<String> = args.ids.iter().map(|id| resolver.resolve(&args.root, id)).collect();
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }
    for (id, path) in args.ids.iter().zip(&paths) {
        println!("{:<24} {}", id, path.yellow());
    }
    println!(
        "{} at most {} children per shard directory",
        "·".dimmed(),
        resolver.fan_out()
    );
    Ok(())
}

fn cmd_deliver(args: DeliverArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(file) => FanoutConfig::load(file)
            .with_context(|| format!("loading {}", file.display()))?,
        None => FanoutConfig::default(),
    };

    let store = Arc::new(InMemoryContentStore::new());
    store.create_node(MESSAGES_ROOT)?;
    let mut item = ContentItem::new(format!("{MESSAGES_ROOT}/{}", args.id), args.id.as_str())
        .with(props::TO, args.to.clone())
        .with(props::SEND_STATE, props::SEND_STATE_PENDING)
        .with("subject", args.subject.as_str());
    if let Some(actor) = &args.actor {
        item.set(props::ACTOR, actor.as_str());
    }
    if let Some(topic) = &args.topic {
        item.set(props::TOPIC, topic.as_str());
    }
    store.put(&item)?;

    let directory = Arc::new(config.directory.to_directory());
    let engine = FanoutEngine::new(config, store.clone(), directory)?;
    let user = args.actor.as_deref().unwrap_or("anonymous");

    let runtime = tokio::runtime::Runtime::new()?;
    let outcomes = runtime.block_on(async {
        let consumer = engine.subscribe()?;
        engine.publish(item.path(), user).await?;
        engine.bus().close();
        anyhow::Ok(engine.service().run(consumer).await)
    })?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome);
        }
        let final_state = store
            .get(item.path())?
            .and_then(|i| i.string(props::SEND_STATE).map(str::to_string))
            .unwrap_or_default();
        println!("  {} {}", "send state:".dimmed(), final_state);
    }

    let failed = outcomes.iter().filter(|o| !o.is_done()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} deliveries failed", outcomes.len());
    }
    Ok(())
}

fn print_outcome(outcome: &DeliveryOutcome) {
    let path = outcome.item_path.as_deref().unwrap_or("?");
    if outcome.is_done() {
        println!("{} {} delivered ({})", "✓".green().bold(), path.bold(), outcome.event);
    } else {
        println!(
            "{} {} {}",
            "✗".red().bold(),
            path.bold(),
            outcome.error.as_deref().unwrap_or("failed").red()
        );
    }
    for report in &outcome.reports {
        let line = match &report.outcome {
            RouteOutcome::Delivered { path } => path.green(),
            RouteOutcome::AlreadyDelivered { path } => path.dimmed(),
            RouteOutcome::Unclaimed => "no transport".yellow(),
            RouteOutcome::Failed { reason } => reason.red(),
        };
        println!("  {:<28} {}", report.route.to_string(), line);
    }
}
