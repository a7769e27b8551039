use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::io::{self, BufRead, Write};
use twenty48::config::Config;
use twenty48::engine::Direction;
use twenty48::session::{Command, Session, SubmitOutcome};
use twenty48::storage::KeyValueStore;

fn prompt(text: &str) -> Result<()> {
    print!("{}", text);
    io::stdout().flush().context("failed to flush stdout")?;
    Ok(())
}

fn parse_input(input: &str) -> Option<Command> {
    match input {
        "w" => Some(Command::Move(Direction::Up)),
        "s" => Some(Command::Move(Direction::Down)),
        "a" => Some(Command::Move(Direction::Left)),
        "d" => Some(Command::Move(Direction::Right)),
        "u" => Some(Command::Undo),
        "n" => Some(Command::NewGame),
        other => other.parse().ok(),
    }
}

fn ask_for_name<S: KeyValueStore, R: rand::Rng>(
    session: &mut Session<S, R>,
    lines: &mut impl Iterator<Item = io::Result<String>>,
) -> Result<()> {
    prompt("Enter your name for the leaderboard (blank to skip): ")?;
    let Some(line) = lines.next() else {
        return Ok(());
    };
    let name = line.context("failed to read name")?;
    match session.submit_score(&name) {
        SubmitOutcome::Recorded { rank: Some(rank) } => {
            println!("Score saved at position {}.", rank + 1);
        }
        SubmitOutcome::Recorded { rank: None } => {
            println!("Score saved, but it did not make the top ten.");
        }
        SubmitOutcome::Rejected => println!("Score not saved."),
    }
    if let Some(e) = session.last_persist_error() {
        println!("Warning: could not write to storage ({}).", e);
    }
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(config.log.as_str())).init();

    let store = config
        .open_store()
        .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?;
    info!("using data dir {}", config.data_dir.display());
    let mut session = Session::open(store, config.rng());
    println!("Welcome to 2048!");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut end_announced = false;

    loop {
        println!("---------------------");
        println!(
            "Score: {}  Best tile: {}",
            session.score(),
            session.board().highest_tile()
        );
        println!("{}", session.board());

        if !session.is_ended() {
            end_announced = false;
        } else if !end_announced {
            end_announced = true;
            println!();
            println!("---------------------");
            println!("GAME OVER!");
            println!("Final Score: {}", session.score());
            println!("---------------------");
            if session.awaiting_submission() {
                if session.leaderboard().qualifies(session.score()) {
                    ask_for_name(&mut session, &mut lines)?;
                } else {
                    println!("Your score did not make the top ten.");
                }
            }
            println!("Press 'n' for a new game, 'l' for the leaderboard, or 'q' to quit.");
        }

        prompt("Move with w/a/s/d, 'u' to undo, 'n' for new game, 'l' for leaderboard, 'q' to quit: ")?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("failed to read input")?;
        let trimmed_input = line.trim();

        match trimmed_input {
            "q" => {
                println!("Thanks for playing!");
                break;
            }
            "l" => {
                println!("{}", session.leaderboard());
                continue;
            }
            _ => {}
        }

        let Some(command) = parse_input(trimmed_input) else {
            println!("Invalid input. Use w/a/s/d, 'u', 'n', 'l', or 'q'.");
            continue;
        };

        match command {
            Command::Move(direction) => {
                let report = session.apply_move(direction);
                if session.is_ended() && !report.changed {
                    println!("The game is over. Press 'n' to start again.");
                } else if !report.changed {
                    println!("Nothing moves {}.", direction);
                } else if !report.persisted {
                    println!("Warning: the game could not be saved.");
                }
            }
            Command::Undo => {
                if session.undo() {
                    println!("Move undone.");
                } else {
                    println!("Nothing to undo.");
                }
            }
            Command::NewGame => session.new_game(),
            Command::SubmitScore(name) => match session.submit_score(&name) {
                SubmitOutcome::Recorded { .. } => println!("Score saved."),
                SubmitOutcome::Rejected => println!("Score not saved."),
            },
        }
    }
    Ok(())
}
