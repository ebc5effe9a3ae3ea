use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use crossterm::event::KeyEventKind;
use tracing::{error, info};

use pulsetop::app::App;
use pulsetop::config::{
    BoxSelection, CollectOptions, Config, SharedConfig, load_config, load_config_from_path,
};
use pulsetop::event::{Event, EventHandler};
use pulsetop::logging;
use pulsetop::system::collector::Runner;
use pulsetop::system::platform;
use pulsetop::system::tree::SortKey;
use pulsetop::ui::{self, theme::Theme};

#[derive(Parser)]
#[command(
    name = "pulsetop",
    about = "Terminal resource monitor for cpu, memory, disks, network and process trees"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interval between collection passes in milliseconds
    #[arg(long)]
    update_ms: Option<u64>,

    /// Start in tree view
    #[arg(long, default_value_t = false)]
    tree: bool,

    /// Initial process filter; a leading `!` makes it a regex
    #[arg(long)]
    filter: Option<String>,

    /// Sort column: pid, name, command, threads, user, memory, "cpu direct", "cpu lazy"
    #[arg(long)]
    sort: Option<SortKey>,

    /// Log file (defaults to the user cache directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `pulsetop=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Collect twice, print the published snapshots as JSON and exit.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    if let Some(path) = cli.log_file.clone().or_else(logging::default_log_path) {
        logging::init(&path, cli.log_level.as_deref())?;
    }

    let config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };
    let options = collect_options_for_cli(&config, &cli);
    let boxes = options.boxes;
    let interval = Duration::from_millis(options.update_ms);
    let shared = SharedConfig::new(options);

    let sampler = platform::default_sampler().wrap_err("no usable platform backend")?;
    info!(backend = sampler.name(), "starting");
    let runner = Runner::new(sampler, shared.clone())?;

    if cli.once {
        return run_once(runner, boxes, interval).await;
    }

    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut app = App::new(&config.keybinds, shared);
    let result = run(&mut terminal, &runner, &mut app, boxes, interval).await;

    ratatui::restore();
    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "exiting after collector failure");
    }
    runner.shutdown().await?;
    result
}

async fn run(
    terminal: &mut ratatui::DefaultTerminal,
    runner: &Runner,
    app: &mut App,
    boxes: BoxSelection,
    interval: Duration,
) -> Result<()> {
    let theme = Theme::dark();
    let ctx = runner.context();
    let mut reader = runner.reader();
    let mut events = EventHandler::new(interval);

    runner.run(boxes, false, true).await?;
    terminal.draw(|frame| ui::draw(frame, app, &theme))?;

    while app.running {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else { break };
                match event {
                    Event::Key(key) => {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        let action = app.map_key(key);
                        app.dispatch(action);
                    }
                    Event::Tick => runner.run(boxes, false, false).await?,
                    Event::Resize(width, _) => app.on_resize(width),
                }
                for request in app.take_requests() {
                    runner.request(request);
                }
                if app.running && app.take_rebuild() {
                    runner.run(boxes, true, true).await?;
                }
                terminal.draw(|frame| ui::draw(frame, app, &theme))?;
            }
            latest = reader.changed() => {
                app.set_snapshots(latest?);
                if ctx.take_redraw() {
                    terminal.clear()?;
                }
                terminal.draw(|frame| ui::draw(frame, app, &theme))?;
            }
        }
    }

    runner.stop().await
}

async fn run_once(runner: Runner, boxes: BoxSelection, interval: Duration) -> Result<()> {
    // Rates need two samples.
    runner.run(boxes, false, false).await?;
    runner.get_output().await?;
    tokio::time::sleep(interval.min(Duration::from_secs(1))).await;
    runner.run(boxes, false, false).await?;
    let snapshots = runner.get_output().await?;

    println!("{}", serde_json::to_string_pretty(&*snapshots)?);
    runner.shutdown().await
}

fn collect_options_for_cli(config: &Config, cli: &Cli) -> CollectOptions {
    let mut options = CollectOptions::from(config);
    if let Some(ms) = cli.update_ms {
        options.update_ms = ms.max(100);
    }
    if cli.tree {
        options.tree = true;
    }
    if let Some(filter) = &cli.filter {
        options.filter = filter.clone();
    }
    if let Some(sort) = cli.sort {
        options.sort_key = sort;
    }
    if let Ok((width, _)) = crossterm::terminal::size() {
        options.graph_width = usize::from(width).max(1);
    }
    options
}
