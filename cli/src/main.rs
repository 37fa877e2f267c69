use clap::{Parser, Subcommand};
use repeat_cli::commands;
use repeat_cli::logging;
use repeat_cli::readline;
use repeat_cli::CliContext;
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), String> {
    logging::init();
    let ctx = CliContext::new();

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &ctx).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(version, about = "repeating timers, debouncing and throttling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fire once after the delay
    Once {
        #[arg(short, long)]
        ms: Option<u64>,
    },
    /// Fire repeatedly, forever unless a count is given
    Every {
        #[arg(short, long)]
        ms: Option<u64>,
        #[arg(short, long)]
        count: Option<u64>,
    },
    Start {
        id: u64,
    },
    Pause {
        id: u64,
    },
    /// Fire now, outside the schedule
    Fire {
        id: u64,
        #[arg(short, long)]
        pause: bool,
    },
    Reset {
        id: u64,
        #[arg(short, long)]
        ms: Option<u64>,
        #[arg(long)]
        no_restart: bool,
    },
    Remove {
        id: u64,
    },
    List,
    Debounce {
        #[arg(short, long)]
        ms: Option<u64>,
    },
    Throttle,
    Config,
    SaveConfig,
    Exit,
}

async fn respond(line: &str, ctx: &CliContext) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "repeat".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Once { ms }) => commands::create_once(ctx, *ms).await,
        Some(Commands::Every { ms, count }) => commands::create_every(ctx, *ms, *count).await,
        Some(Commands::Start { id }) => commands::start(ctx, *id).await,
        Some(Commands::Pause { id }) => commands::pause(ctx, *id).await,
        Some(Commands::Fire { id, pause }) => commands::fire(ctx, *id, *pause).await,
        Some(Commands::Reset { id, ms, no_restart }) => {
            commands::reset(ctx, *id, *ms, !*no_restart).await
        }
        Some(Commands::Remove { id }) => commands::remove(ctx, *id).await,
        Some(Commands::List) => commands::list_timers(ctx).await,
        Some(Commands::Debounce { ms }) => commands::debounce(ctx, *ms).await,
        Some(Commands::Throttle) => commands::throttle(ctx).await,
        Some(Commands::Config) => commands::show_config(ctx).await,
        Some(Commands::SaveConfig) => commands::save_config(ctx).await,
        Some(Commands::Exit) => {
            commands::exit();
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}
