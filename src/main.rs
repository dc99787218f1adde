//! Takt - timeline sync core
//!
//! Command-line client: inspect zones and tasks, apply edit gestures, and
//! follow live updates against a Takt API server.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use takt::api::TaskApi;
use takt::view::EventBar;
use takt::{
    ChannelStatus, HttpTaskApi, SelectionScope, TaktConfig, TaktError, TaskDraft, TaskId,
    TaskPatch, TaskStatus, TimelineSession, TimelineView, TradeId, WebSocketConnector, ZoneId,
};

#[derive(Parser)]
#[command(name = "takt")]
#[command(version)]
#[command(about = "Timeline sync client for zone-scheduled tasks", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file
    #[arg(short, long, global = true, env = "TAKT_CONFIG", default_value = "takt.toml")]
    config: PathBuf,

    /// API root, overrides the config file
    #[arg(long, global = true, env = "TAKT_API_URL")]
    api_url: Option<String>,

    /// Push channel URL, overrides the config file
    #[arg(long, global = true, env = "TAKT_LIVE_URL")]
    live_url: Option<String>,

    /// Project id, overrides the config file
    #[arg(short, long, global = true, env = "TAKT_PROJECT")]
    project: Option<i64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the API server
    Health,

    /// Print the zone hierarchy
    Zones {
        /// Output JSON rows
        #[arg(long)]
        json: bool,
    },

    /// Select zones and print their task bars
    Tasks {
        /// Zones to select (repeatable)
        #[arg(short, long = "zone", required = true, num_args = 1..)]
        zones: Vec<ZoneId>,

        /// Include descendants of selected zones
        #[arg(long)]
        subtree: bool,

        /// Only bars starting on or after this date
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only bars starting on or before this date
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output JSON view
        #[arg(long)]
        json: bool,
    },

    /// Move a task to another zone and start date
    Move {
        task: TaskId,

        #[arg(short, long)]
        zone: ZoneId,

        #[arg(short, long)]
        start: NaiveDate,
    },

    /// Change a task's span; partial days round up
    Resize {
        task: TaskId,

        /// YYYY-MM-DD or YYYY-MM-DDTHH:MM
        #[arg(long, value_parser = parse_when)]
        start: NaiveDateTime,

        /// YYYY-MM-DD or YYYY-MM-DDTHH:MM
        #[arg(long, value_parser = parse_when)]
        end: NaiveDateTime,
    },

    /// Create a task
    Create {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        start: NaiveDate,

        #[arg(short, long, default_value = "1")]
        duration: u32,

        /// Defaults to the last selected zone
        #[arg(short, long)]
        zone: Option<ZoneId>,

        /// Zones to select first
        #[arg(long = "select")]
        select: Vec<ZoneId>,

        #[arg(long, default_value = "planned")]
        status: TaskStatus,

        #[arg(long)]
        trade: Option<TradeId>,
    },

    /// Edit fields of an existing task
    Update {
        task: TaskId,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short, long)]
        start: Option<NaiveDate>,

        #[arg(short, long)]
        duration: Option<u32>,

        #[arg(long)]
        status: Option<TaskStatus>,
    },

    /// Follow live updates for the selected zones until Ctrl-C
    Watch {
        #[arg(short, long = "zone", required = true, num_args = 1..)]
        zones: Vec<ZoneId>,
    },
}

fn parse_when(s: &str) -> Result<NaiveDateTime, String> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| format!("expected YYYY-MM-DD or YYYY-MM-DDTHH:MM ({e})"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "takt=debug,info"
    } else {
        "takt=info,warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
    Ok(())
}

fn load_config(cli: &Cli) -> takt::Result<TaktConfig> {
    let mut config = TaktConfig::load(&cli.config)?;
    if let Some(url) = &cli.api_url {
        config.api.base_url.clone_from(url);
    }
    if let Some(url) = &cli.live_url {
        config.live.url.clone_from(url);
    }
    if let Some(project) = cli.project {
        config.project_id = project;
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> takt::Result<()> {
    let mut config = load_config(&cli)?;
    if let Commands::Tasks { subtree: true, .. } = cli.command {
        config.view.selection_scope = SelectionScope::Subtree;
    }
    let http = HttpTaskApi::new(config.http())
        .map_err(|e| TaktError::config(format!("cannot build HTTP client: {e}")))?;
    let api: Arc<dyn TaskApi> = Arc::new(http);
    let session = TimelineSession::from_config(api.clone(), &config);

    match cli.command {
        Commands::Health => {
            let health = api
                .health()
                .await
                .map_err(|e| TaktError::Other(anyhow::anyhow!("health check failed: {e}")))?;
            if health.is_healthy() {
                println!("{} API at {} is {}", "OK".green().bold(), config.api.base_url, health.status);
            } else {
                println!(
                    "{} API at {} reports {}",
                    "Warning:".yellow().bold(),
                    config.api.base_url,
                    health.status
                );
            }
        }

        Commands::Zones { json } => {
            session.load_zones().await?;
            let view = session.view().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&view.resources)?);
            } else {
                for row in &view.resources {
                    println!("{}{} {}", "  ".repeat(row.indent_level as usize), row.name.bold(), format!("#{}", row.id).dimmed());
                }
            }
        }

        Commands::Tasks {
            zones,
            from,
            to,
            json,
            ..
        } => {
            session.load_zones().await?;
            session.select_zones(&zones).await?;
            let mut view = session.view().await;
            view.events.retain(|bar| {
                from.is_none_or(|from| bar.start >= from) && to.is_none_or(|to| bar.start <= to)
            });
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }

        Commands::Move { task, zone, start } => {
            session.load_zones().await?;
            session.refresh_task(task).await?;
            let moved = session.editor().move_task(task, start, zone).await?;
            println!(
                "{} Task {} now in zone {} from {}",
                "OK".green().bold(),
                moved.id,
                moved.zone_id,
                moved.start_date
            );
        }

        Commands::Resize { task, start, end } => {
            session.load_zones().await?;
            session.refresh_task(task).await?;
            let resized = session.editor().resize_task(task, start, end).await?;
            println!(
                "{} Task {} runs {} for {} days",
                "OK".green().bold(),
                resized.id,
                resized.start_date,
                resized.duration
            );
        }

        Commands::Create {
            name,
            start,
            duration,
            zone,
            select,
            status,
            trade,
        } => {
            session.load_zones().await?;
            if !select.is_empty() {
                session.select_zones(&select).await?;
            }
            let mut draft = TaskDraft::new(name, start, duration).with_status(status);
            if let Some(zone) = zone {
                draft = draft.with_zone(zone);
            }
            if let Some(trade) = trade {
                draft = draft.with_trade(trade);
            }
            let created = session.editor().create_task(draft).await?;
            println!(
                "{} Created task {} in zone {}",
                "OK".green().bold(),
                created.id,
                created.zone_id
            );
        }

        Commands::Update {
            task,
            name,
            start,
            duration,
            status,
        } => {
            session.load_zones().await?;
            session.refresh_task(task).await?;
            let patch = TaskPatch {
                name,
                start_date: start,
                duration,
                status,
                ..TaskPatch::default()
            };
            let updated = session.editor().update_task(task, patch).await?;
            println!("{} Updated task {}", "OK".green().bold(), updated.id);
        }

        Commands::Watch { zones } => {
            session.load_zones().await?;
            session.select_zones(&zones).await?;
            watch(&session, &config).await?;
        }
    }

    Ok(())
}

async fn watch(session: &TimelineSession, config: &TaktConfig) -> takt::Result<()> {
    let watcher = session.watch_view().await;
    let mut views = watcher.subscribe();
    let live = session.live_channel(Arc::new(WebSocketConnector::new(config.live.url.clone())));
    let mut status = live.status();
    let mut channel = live.spawn();

    print_view(&watcher.current());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\n{} Stopped", "OK".green().bold());
                channel.abort();
                return Ok(());
            }
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let view = views.borrow_and_update().clone();
                println!();
                print_view(&view);
            }
            changed = status.changed() => {
                if changed.is_ok() {
                    let now = *status.borrow_and_update();
                    print_status(now);
                }
            }
            finished = &mut channel => {
                return match finished {
                    Ok(result) => result,
                    Err(e) => Err(TaktError::Other(anyhow::anyhow!("live channel task failed: {e}"))),
                };
            }
        }
    }
}

fn print_status(status: ChannelStatus) {
    match status {
        ChannelStatus::Connecting => println!("{} connecting", "Live:".cyan().bold()),
        ChannelStatus::Connected => println!("{} connected", "Live:".cyan().bold()),
        ChannelStatus::Reconnecting { attempt } => {
            println!("{} reconnecting (attempt {})", "Live:".yellow().bold(), attempt);
        }
        ChannelStatus::Degraded => {
            println!("{} live updates unavailable", "Warning:".yellow().bold());
        }
    }
}

fn print_view(view: &TimelineView) {
    for row in &view.resources {
        let indent = "  ".repeat(row.indent_level as usize);
        println!("{}{}", indent, row.name.bold());
        for bar in view.events_for(row.id) {
            println!("{}  {}", indent, format_bar(bar));
        }
    }
    if view.events.is_empty() {
        println!("{}", "(no tasks in selection)".dimmed());
    }
}

fn format_bar(bar: &EventBar) -> String {
    let status = match bar.status {
        TaskStatus::Planned => bar.status.to_string().blue(),
        TaskStatus::InProgress => bar.status.to_string().yellow(),
        TaskStatus::Completed => bar.status.to_string().green(),
    };
    format!(
        "#{} {} {} → {} [{}]",
        bar.id, bar.text, bar.start, bar.end, status
    )
}
