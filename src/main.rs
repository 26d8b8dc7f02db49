use anyhow::{Context, Result};

use std::io::{stdout, Write};
use std::ops::ControlFlow;

use clap::{Parser, Subcommand, ValueEnum};
use crossterm::{
    style::{style, Attribute, Color, PrintStyledContent},
    QueueableCommand,
};
use indicatif::{ProgressBar, ProgressStyle};

use popout::config::{Config, DEFAULT_TABLE_SIZE};
use popout::{Game, ProofTarget, Side, Solver, HEIGHT, WIDTH};

/// Exact solvers for PopOut positions
#[derive(Parser, Debug)]
#[command(name = "popout", version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value_t = WIDTH)]
    width: usize,

    #[arg(long, default_value_t = HEIGHT)]
    height: usize,

    /// Transposition table buckets, 0 disables caching
    #[arg(long, default_value_t = DEFAULT_TABLE_SIZE)]
    tt_size: usize,

    /// Plies the favored side has to win within (handicap and proof-number search)
    #[arg(long)]
    ply_limit: Option<usize>,

    /// Pops allowed to the favored side
    #[arg(long, default_value_t = 0)]
    pop_limit: u32,

    /// Let the favored side pop without limit
    #[arg(long, conflicts_with = "pop_limit")]
    unlimited_pops: bool,

    /// Play plain Connect 4, without pops
    #[arg(long)]
    no_popout: bool,

    /// Give up once the proof tree holds this many nodes [default: 1 GiB worth]
    #[arg(long)]
    node_limit: Option<usize>,

    /// Hide the progress spinner
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exact alpha-beta search
    AlphaBeta {
        #[arg(long, default_value_t = 86)]
        depth: u32,
        #[arg(default_value = "")]
        variation: String,
    },
    /// Look for a win for one side under the ply and pop limits
    Handicap {
        #[arg(long, value_enum, default_value_t = Player::First)]
        favored: Player,
        #[arg(default_value = "")]
        variation: String,
    },
    /// Proof-number search
    Proof {
        #[arg(value_enum)]
        target: Target,
        #[arg(default_value = "")]
        variation: String,
    },
    /// Retrograde analysis of the whole board, small boards only
    Retro {
        #[arg(default_value = "")]
        variation: String,
    },
    /// A move that wins within the given depth
    BestMove {
        #[arg(long, default_value_t = 86)]
        depth: u32,
        #[arg(default_value = "")]
        variation: String,
    },
}

impl Command {
    fn variation(&self) -> &str {
        match self {
            Command::AlphaBeta { variation, .. }
            | Command::Handicap { variation, .. }
            | Command::Proof { variation, .. }
            | Command::Retro { variation }
            | Command::BestMove { variation, .. } => variation,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Player {
    First,
    Second,
}

impl From<Player> for Side {
    fn from(player: Player) -> Self {
        match player {
            Player::First => Side::First,
            Player::Second => Side::Second,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Target {
    First,
    Second,
    Exact,
}

impl From<Target> for ProofTarget {
    fn from(target: Target) -> Self {
        match target {
            Target::First => ProofTarget::First,
            Target::Second => ProofTarget::Second,
            Target::Exact => ProofTarget::Exact,
        }
    }
}

fn display(game: &Game) -> Result<()> {
    let mut stdout = stdout();

    let columns: String = (0..game.geometry().width())
        .map(|column| (b'a' + column as u8) as char)
        .collect();
    stdout.queue(PrintStyledContent(style(columns + "\n")))?;

    for row in game.to_string().lines() {
        for cell in row.chars() {
            stdout.queue(PrintStyledContent(
                style("O")
                    .attribute(Attribute::Bold)
                    .on(Color::DarkBlue)
                    .with(match cell {
                        'X' => Color::Red,
                        'O' => Color::Yellow,
                        _ => Color::DarkBlue,
                    }),
            ))?;
        }
        stdout.queue(PrintStyledContent(style("\n")))?;
    }
    stdout.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = Config {
        width: cli.width,
        height: cli.height,
        table_size: cli.tt_size,
        ply_limit: cli.ply_limit,
        pop_limit: if cli.unlimited_pops { None } else { Some(cli.pop_limit) },
        popout: !cli.no_popout,
        node_limit: cli.node_limit.or(Config::default().node_limit),
        ..Config::default()
    };
    let mut solver = Solver::new(config).context("failed to set up the solver")?;

    let variation = cli.command.variation();
    solver
        .load_variation(variation)
        .with_context(|| format!("failed to load variation \"{}\"", variation))?;

    println!("Board size is {}x{}", cli.width, cli.height);
    display(solver.game()).context("failed to draw board")?;
    let to_move = match solver.side_to_move() {
        Side::First => "X",
        Side::Second => "O",
    };
    println!("{} to move after \"{}\"", to_move, solver.variation());

    let progress = if cli.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    progress.set_style(ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}"));
    let spinner = progress.clone();
    solver.set_reporter(move |report| {
        let stats = report.stats;
        spinner.set_message(&format!(
            "{} nodes, {} expansions, {} live, at \"{}\"",
            stats.interior,
            stats.expansions,
            stats.live_nodes,
            report.game.variation()
        ));
        spinner.tick();
        ControlFlow::Continue(())
    });

    let result = match &cli.command {
        Command::AlphaBeta { depth, .. } => solver.run_alpha_beta(*depth).map(|score| score.to_string()),
        Command::Handicap { favored, .. } => solver
            .run_handicap_for((*favored).into())
            .map(|score| score.to_string()),
        Command::Proof { target, .. } => solver
            .run_proof_number((*target).into())
            .map(|score| score.to_string()),
        Command::Retro { .. } => {
            let code = solver.position_code();
            solver.retrograde_score(code).map(|outcome| outcome.to_string())
        }
        Command::BestMove { depth, .. } => solver.best_move(*depth).map(|mv| match mv {
            Some(mv) => format!("play {}", mv),
            None => "no winning move found".to_string(),
        }),
    };
    progress.finish_and_clear();
    let result = result.context("search failed")?;

    println!("Result: {}", result);
    if let Command::Retro { .. } = cli.command {
        let retro = solver.retrograde()?;
        println!(
            "{} reachable states, {} without pops",
            retro.state_count(),
            retro.drop_states()
        );
    }
    println!("{}", solver.stats());
    Ok(())
}
