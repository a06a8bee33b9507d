use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use repeated_maze::constructions;
use repeated_maze::filters;
use repeated_maze::maze::{MAX_NTERM, Maze, detect_nterm};
use repeated_maze::mazegen::random::random_maze;
use repeated_maze::quizmaster::{self, SearchConfig};
use repeated_maze::render;
use repeated_maze::solver::{Bfs, DEFAULT_MAX_DEPTH, Iddfs, Solver};

#[derive(Parser)]
#[command(name = "repeated-maze", version, about = "Busy-beaver search over repeated mazes")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Solve a maze and report the shortest start-to-goal path.
    Solve {
        /// Maze string, e.g. "normal: W0->E1, E1->W1; nx: (none); ny: (none)"
        maze: Option<String>,
        /// Solve a named reference construction instead of a maze string.
        #[arg(long, conflicts_with = "maze")]
        construction: Option<String>,
        /// Terminal count per direction; detected from the maze string if omitted.
        #[arg(long)]
        nterm: Option<usize>,
        /// Use the BFS solver (may not terminate on unreachable goals).
        #[arg(long)]
        bfs: bool,
        /// IDDFS depth ceiling.
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
        /// Also print the port table, grid and per-step annotations.
        #[arg(short, long)]
        verbose: bool,
        /// Emit the result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Search the maze space for the longest shortest path.
    Search {
        /// Terminal count per direction.
        #[arg(long)]
        nterm: usize,
        /// Use random sampling instead of exhaustive enumeration.
        #[arg(long, conflicts_with = "topdown")]
        random: bool,
        /// Use top-down port deletion instead of exhaustive enumeration.
        #[arg(long)]
        topdown: bool,
        /// Use the BFS solver inside the search.
        #[arg(long)]
        bfs: bool,
        /// Smallest number of active ports.
        #[arg(long, default_value_t = 0)]
        min_aport: usize,
        /// Largest number of active ports; all candidates if omitted.
        #[arg(long)]
        max_aport: Option<usize>,
        /// Stop once a maze of at least this length is found; 0 = never.
        #[arg(long, default_value_t = 0)]
        max_len: usize,
        /// Seed for the random strategy.
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Iteration budget for the random strategy; 0 = until Ctrl-C.
        #[arg(long, default_value_t = 0)]
        max_iter: u64,
        /// IDDFS depth ceiling.
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,
        /// Also print the port table, grid and per-step annotations.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the canonical (normalized) form of a maze.
    Norm {
        /// Maze string.
        maze: String,
        /// Terminal count per direction; detected if omitted.
        #[arg(long)]
        nterm: Option<usize>,
    },
    /// Generate a random maze string.
    Gen {
        #[arg(long)]
        nterm: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn check_nterm(nterm: usize) -> Result<()> {
    if !(2..=MAX_NTERM).contains(&nterm) {
        bail!("nterm must be in 2..={}, got {}", MAX_NTERM, nterm);
    }
    Ok(())
}

fn make_solver(bfs: bool, max_depth: usize) -> Box<dyn Solver> {
    if bfs {
        Box::new(Bfs)
    } else {
        Box::new(Iddfs { max_depth })
    }
}

fn cmd_solve(
    maze: Option<String>,
    construction: Option<String>,
    nterm: Option<usize>,
    bfs: bool,
    max_depth: usize,
    verbose: bool,
    json: bool,
) -> Result<()> {
    let (maze_str, nterm) = match construction {
        Some(name) => {
            let Some(c) = constructions::get_construction(&name) else {
                bail!(
                    "unknown construction {:?}; known: {}",
                    name,
                    constructions::all_constructions()
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            };
            (c.maze.clone(), nterm.unwrap_or(c.nterm))
        }
        None => {
            let Some(s) = maze else {
                bail!("either a maze string or --construction is required");
            };
            let nterm = nterm.unwrap_or_else(|| detect_nterm(&s));
            (s, nterm)
        }
    };
    check_nterm(nterm)?;
    let m = Maze::parse(nterm, &maze_str)?;
    let solver = make_solver(bfs, max_depth);
    let result = solver.solve_path(&m);

    if json {
        let value = match &result {
            Some(path) => serde_json::json!({
                "nterm": nterm,
                "maze": m.to_string(),
                "length": path.len() - 1,
                "path": path.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            }),
            None => serde_json::json!({
                "nterm": nterm,
                "maze": m.to_string(),
                "length": null,
                "path": [],
            }),
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Maze: {}", m);
    match result {
        None => println!("No path found"),
        Some(path) => {
            println!("Path length: {}", path.len() - 1);
            println!("Path: {}", render::path_line(&path));
            if verbose {
                println!();
                print!("{}", render::port_table(&m));
                println!();
                print!("{}", render::path_grid(&path));
                println!();
                print!("{}", render::path_verbose(&m, &path));
            }
        }
    }
    Ok(())
}

fn cmd_search(
    cfg: SearchConfig,
    random: bool,
    topdown: bool,
    bfs: bool,
    max_depth: usize,
    verbose: bool,
) -> Result<()> {
    check_nterm(cfg.nterm)?;
    let solver = make_solver(bfs, max_depth);
    let best = if topdown {
        quizmaster::topdown_search(&cfg, solver.as_ref())
    } else if random {
        quizmaster::random_search(&cfg, solver.as_ref())
    } else {
        quizmaster::exhaustive_search(&cfg, solver.as_ref())
    };
    match best {
        None => println!("No maze with a valid path found."),
        Some(best) => {
            println!("=== Best result ===");
            println!("Path length: {}", best.length);
            println!("Maze: {}", best.maze);
            println!("Path: {}", render::path_line(&best.path));
            if verbose {
                println!();
                print!("{}", render::port_table(&best.maze));
                println!();
                print!("{}", render::path_grid(&best.path));
                println!();
                print!("{}", render::path_verbose(&best.maze, &best.path));
            }
        }
    }
    Ok(())
}

fn cmd_norm(maze: String, nterm: Option<usize>) -> Result<()> {
    let nterm = nterm.unwrap_or_else(|| detect_nterm(&maze));
    check_nterm(nterm)?;
    let mut m = Maze::parse(nterm, &maze)?;
    filters::normalize(&mut m);
    println!("{}", m);
    Ok(())
}

fn cmd_gen(nterm: usize, seed: Option<u64>) -> Result<()> {
    check_nterm(nterm)?;
    println!("{}", random_maze(nterm, seed));
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    match cli.cmd {
        Cmd::Solve {
            maze,
            construction,
            nterm,
            bfs,
            max_depth,
            verbose,
            json,
        } => cmd_solve(maze, construction, nterm, bfs, max_depth, verbose, json),
        Cmd::Search {
            nterm,
            random,
            topdown,
            bfs,
            min_aport,
            max_aport,
            max_len,
            seed,
            max_iter,
            max_depth,
            verbose,
        } => cmd_search(
            SearchConfig {
                nterm,
                min_aport,
                max_aport,
                max_len,
                seed,
                max_iter,
            },
            random,
            topdown,
            bfs,
            max_depth,
            verbose,
        ),
        Cmd::Norm { maze, nterm } => cmd_norm(maze, nterm),
        Cmd::Gen { nterm, seed } => cmd_gen(nterm, seed),
    }
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(if e.use_stderr() { 1 } else { 0 });
    });
    if let Err(e) = run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
