use anyhow::{Context, Result};
use clap::Parser;
use dungeon_agent_core::{
    Cell, Item, Position, START_MARKER,
    agent::DungeonAgent,
    config::AgentConfig,
    environment::{ActionResult, Environment, load_environment_from_string},
    protocol,
};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    collections::HashSet,
    fs::File,
    io::{self, Stdout},
    net::TcpStream,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Port of a game engine to play against, headless
    #[arg(short, long, conflicts_with = "map")]
    port: Option<u16>,

    /// Host of the game engine
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Map file to play locally in the terminal UI
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    /// Give up after this many turns
    #[arg(long, default_value_t = 10_000)]
    max_turns: u64,

    /// Milliseconds between simulated turns
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,

    /// Ceiling on nodes expanded by a single A* search
    #[arg(long)]
    max_expansions: Option<usize>,

    /// Write logs here (the terminal UI otherwise discards them)
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

impl Args {
    fn agent_config(&self) -> AgentConfig {
        let mut config = AgentConfig::default();
        if let Some(max_expansions) = self.max_expansions {
            config.limits.max_expansions = max_expansions;
        }
        config
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_logging(log_file: Option<&Path>, to_stderr: bool) -> Result<()> {
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("could not create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None if to_stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(io::stderr)
                .init();
        }
        None => {}
    }
    Ok(())
}

struct App {
    /// The true dungeon.
    environment: Environment,
    /// The agent playing it.
    agent: DungeonAgent,
    /// Last turn's result; terminal once the game is over.
    last_result: Option<ActionResult>,
    max_turns: u64,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(map_file: &Path, config: AgentConfig, max_turns: u64) -> Result<Self> {
        let file_string = std::fs::read_to_string(map_file)
            .with_context(|| format!("failed to read map file {}", map_file.display()))?;
        let environment = load_environment_from_string(&file_string)
            .with_context(|| format!("failed to load map {}", map_file.display()))?;
        let config = AgentConfig {
            initial_facing: environment.facing(),
            ..config
        };

        Ok(App {
            environment,
            agent: DungeonAgent::new(config),
            last_result: None,
            max_turns,
            should_quit: false,
        })
    }

    fn game_over(&self) -> bool {
        self.last_result.as_ref().is_some_and(ActionResult::is_terminal)
            || self.environment.turns() as u64 >= self.max_turns
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) {
        if self.game_over() {
            return;
        }
        let result = self.environment.process_turn(&mut self.agent);
        if result.is_terminal() {
            info!("game over after {} turns: {:?}", self.environment.turns(), result);
        }
        self.last_result = Some(result);
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.agent_config();

    if let Some(port) = args.port {
        init_logging(args.log_file.as_deref(), true)?;
        return play_remote(&args.host, port, config, args.max_turns);
    }

    init_logging(args.log_file.as_deref(), false)?;
    // If no map file is provided, use the default map
    let map_file = args.map.clone().unwrap_or(PathBuf::from("maps/map01.txt"));
    if !map_file.exists() {
        return Err(anyhow::anyhow!(
            "Map file does not exist: {}",
            map_file.display()
        ));
    }

    let mut app = App::new(&map_file, config, args.max_turns)?;
    let mut terminal = setup_terminal()?;
    let outcome = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));
    restore_terminal(&mut terminal)?;
    outcome
}

/// Plays a game engine over TCP until it hangs up.
fn play_remote(host: &str, port: u16, config: AgentConfig, max_turns: u64) -> Result<()> {
    let stream = TcpStream::connect((host, port))
        .with_context(|| format!("could not connect to {host}:{port}"))?;
    stream.set_nodelay(true).context("could not disable Nagle")?;
    let mut reader = stream.try_clone().context("could not clone the connection")?;
    let mut writer = stream;
    info!("connected to {}:{}", host, port);

    let mut agent = DungeonAgent::new(config);
    let outcome = protocol::run_session(&mut agent, &mut reader, &mut writer, max_turns)
        .with_context(|| format!("session ended abnormally after {} turns", agent.turn()))?;
    if !outcome.finished {
        info!("stopped without the gold after {} turns", outcome.turns);
    }
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => app.tick(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(70), // Maps
            Constraint::Percentage(20), // Agent status
            Constraint::Percentage(10), // Help
        ])
        .split(frame.area());
    let maps = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(main_layout[0]);

    render_dungeon(frame, maps[0], &app.environment);
    render_knowledge(frame, maps[1], &app.agent);
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new("Press 'q' or 'Esc' to quit, space to step.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

fn cell_span(cell: Cell) -> Span<'static> {
    let style = match cell {
        Cell::Wall => Style::default().fg(Color::DarkGray),
        Cell::Water => Style::default().fg(Color::Blue),
        Cell::Tree => Style::default().fg(Color::Green),
        Cell::Door => Style::default().fg(Color::Magenta),
        Cell::Unexplored => Style::default().fg(Color::Gray),
        Cell::Gold => Style::default().fg(Color::Yellow).bold(),
        Cell::Axe | Cell::Dynamite | Cell::Key => Style::default().fg(Color::Cyan),
        Cell::Floor => Style::default(),
    };
    Span::styled(cell.symbol().to_string(), style)
}

fn agent_span(arrow: char) -> Span<'static> {
    Span::styled(arrow.to_string(), Style::default().fg(Color::Red).bold())
}

fn start_span() -> Span<'static> {
    Span::styled(START_MARKER.to_string(), Style::default().fg(Color::Green).bold())
}

/// Renders the true dungeon.
fn render_dungeon(frame: &mut Frame, area: Rect, environment: &Environment) {
    let terrain = environment.terrain();
    let mut lines: Vec<Line> = Vec::with_capacity(terrain.height());
    for y in 0..terrain.height() {
        let spans: Vec<Span> = (0..terrain.width())
            .map(|x| {
                let here = Position::new(x, y);
                if here == environment.position() {
                    agent_span(environment.facing().arrow())
                } else if here == environment.start() {
                    start_span()
                } else {
                    cell_span(environment.cell_at(here))
                }
            })
            .collect();
        lines.push(Line::from(spans));
    }

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Dungeon").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

/// Renders what the agent has learned so far, with its current path.
fn render_knowledge(frame: &mut Frame, area: Rect, agent: &DungeonAgent) {
    let bounds = agent.map().bounds();
    let path: HashSet<Position> = agent
        .goal()
        .map(|goal| goal.path[goal.cursor..].iter().map(|w| w.position).collect())
        .unwrap_or_default();

    let lines: Vec<Line> = (bounds.min_y..=bounds.max_y)
        .map(|y| {
            let spans: Vec<Span> = (bounds.min_x..=bounds.max_x)
                .map(|x| {
                    let here = Position::new(x, y);
                    let span = if here == agent.position() {
                        agent_span(agent.facing().arrow())
                    } else if here == agent.start() {
                        start_span()
                    } else {
                        cell_span(agent.cell(here).unwrap_or_default())
                    };
                    if path.contains(&here) {
                        span.on_dark_gray()
                    } else {
                        span
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Agent's map").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

/// Renders the inventory, goal and game state.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let inventory = app.agent.inventory();
    let mut held: Vec<Span> = vec![Span::raw("Holding: ")];
    for item in Item::ALL {
        held.push(cell_span(Cell::from(item)));
        held.push(Span::raw(format!(" {}  ", inventory.get(item))));
    }

    let goal = match app.agent.goal() {
        Some(goal) => format!(
            "Goal: {:?} '{}' at {} (score {}, {} steps left)",
            goal.kind,
            goal.cell.symbol(),
            goal.target,
            goal.score,
            goal.path.len().saturating_sub(goal.cursor + 1)
        ),
        None => "Goal: none".to_string(),
    };

    let state = match &app.last_result {
        Some(ActionResult::Win) => "Won!".to_string(),
        Some(ActionResult::Lose) => "Drowned.".to_string(),
        _ if app.game_over() => "Out of turns.".to_string(),
        Some(ActionResult::Failure(reason)) => format!("Playing (last action failed: {reason})"),
        _ => "Playing".to_string(),
    };

    let items = vec![
        ListItem::from(Line::from(held)),
        ListItem::from(goal),
        ListItem::from(format!(
            "Turn {}  {}  Candidates tracked: {}",
            app.environment.turns(),
            state,
            app.agent.candidates().len()
        )),
    ];
    let status_widget =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Agent"));
    frame.render_widget(status_widget, area);
}
