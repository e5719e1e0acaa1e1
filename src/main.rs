use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use treasure_hunt::config::AppConfig;
use treasure_hunt::error::MazeError;
use treasure_hunt::maze::{Cell, TextRenderer};
use treasure_hunt::trainer::{CancelToken, PlayStatus, Trainer};

const DEFAULT_MODEL: &str = "smart_agent";

#[derive(Parser, Debug)]
#[command(version, about = "Train and run a Deep Q-learning agent in a grid maze")]
struct Cli {
    /// YAML file with `maze` and `trainer` sections. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model and save it. Type `q` + Enter to stop early.
    Train(TrainArgs),
    /// Load a model and walk the maze greedily.
    Play(PlayArgs),
    /// Print the maze.
    Show,
    /// Interactive menu (the default).
    Menu,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Model name, saved as `<models_dir>/<name>.bin`.
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    name: String,

    #[arg(short, long, default_value_t = 500)]
    epochs: usize,

    #[arg(short, long, default_value_t = 64)]
    batch_size: usize,

    /// Step cap per episode.
    #[arg(short, long, default_value_t = 500)]
    max_steps: usize,

    /// Continue from the saved model with the same name, if there is one.
    #[arg(long)]
    resume: bool,

    /// Write the training report as JSON.
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlayArgs {
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    name: String,

    /// Start cell as `row,col`. Defaults to the maze's start.
    #[arg(short, long)]
    start: Option<Cell>,

    #[arg(short, long, default_value_t = 500)]
    max_steps: usize,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => AppConfig::default(),
    };
    let mut trainer = config.build_trainer().context("invalid maze configuration")?;

    match cli.command.unwrap_or(Command::Menu) {
        Command::Train(args) => {
            let input = StdinWatcher::spawn(trainer.cancel_token());
            train(&mut trainer, &input, &args)
        }
        Command::Play(args) => {
            trainer.load_model(&args.name)?;
            let start = args.start.unwrap_or_else(|| trainer.maze().start());
            play(&mut trainer, start, args.max_steps)
        }
        Command::Show => {
            print!("{}", trainer.maze().show(&TextRenderer::new(), None));
            Ok(())
        }
        Command::Menu => {
            let input = StdinWatcher::spawn(trainer.cancel_token());
            menu(&mut trainer, &input)
        }
    }
}

/// Reads stdin on a background thread. While training is running, a `q`
/// line cancels it; otherwise lines are forwarded to the menu.
struct StdinWatcher {
    lines: Receiver<String>,
    training: Arc<AtomicBool>,
}

impl StdinWatcher {
    fn spawn(cancel: CancelToken) -> Self {
        let (tx, rx) = mpsc::channel();
        let training = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&training);

        thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line.trim().to_string(),
                    Err(_) => break,
                };
                if flag.load(Ordering::SeqCst) {
                    if line.eq_ignore_ascii_case("q") {
                        info!("Stop requested, finishing the current epoch");
                        cancel.cancel();
                    }
                    continue;
                }
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        StdinWatcher { lines: rx, training }
    }

    /// Print `message` and wait for a line. `None` once stdin is closed.
    fn prompt(&self, message: &str) -> Option<String> {
        print!("{}", message);
        let _ = io::stdout().flush();
        self.lines.recv().ok()
    }

    fn set_training(&self, on: bool) {
        self.training.store(on, Ordering::SeqCst);
    }
}

fn train(trainer: &mut Trainer, input: &StdinWatcher, args: &TrainArgs) -> Result<()> {
    if args.resume && trainer.store().exists(&args.name) {
        trainer.load_model(&args.name)?;
    }

    println!("Training '{}'. Type q + Enter to stop early.", args.name);
    input.set_training(true);
    let report = trainer.train(args.epochs, args.batch_size, args.max_steps, &args.name);
    input.set_training(false);
    let report = report?;

    info!(
        "Finished after {} epochs ({:?}): win rate {:.3}, epsilon {:.3}, mean loss {:.4}",
        report.epochs_run,
        report.stop_reason,
        report.final_win_rate,
        report.final_epsilon,
        report.mean_loss()
    );
    if let Some(best) = report.best_steps {
        info!("Shortest winning episode: {} steps", best);
    }
    if let Some(path) = &args.metrics_out {
        report.write_json(path)?;
        info!("Training report written to {}", path.display());
    }
    Ok(())
}

fn play(trainer: &mut Trainer, start: Cell, max_steps: usize) -> Result<()> {
    let outcome = trainer.play(start, max_steps)?;
    print!("{}", trainer.maze().show(&TextRenderer::new(), Some(&outcome.path)));

    match outcome.status {
        PlayStatus::Win => println!("Reached the target in {} steps.", outcome.steps),
        PlayStatus::Stuck => println!("Stuck after {} steps.", outcome.steps),
        PlayStatus::Timeout => println!("Gave up after {} steps.", outcome.steps),
    }
    println!("Total reward: {:.2}", outcome.total_reward);
    Ok(())
}

fn menu(trainer: &mut Trainer, input: &StdinWatcher) -> Result<()> {
    loop {
        println!();
        println!("1. Train new model");
        println!("2. Load model");
        println!("3. Play");
        println!("4. Show maze");
        println!("5. Quit");

        let choice = match input.prompt("> ") {
            Some(choice) => choice,
            None => return Ok(()),
        };

        let result = match choice.as_str() {
            "1" => menu_train(trainer, input),
            "2" => menu_load(trainer, input),
            "3" => menu_play(trainer, input),
            "4" => {
                print!("{}", trainer.maze().show(&TextRenderer::new(), None));
                Ok(())
            }
            "5" | "q" => return Ok(()),
            other => {
                println!("Unknown option '{}'", other);
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("{:#}", e);
        }
    }
}

/// Empty answers fall back to `default`.
fn ask_or(input: &StdinWatcher, question: &str, default: &str) -> String {
    match input.prompt(&format!("{} [{}]: ", question, default)) {
        Some(answer) if !answer.is_empty() => answer,
        _ => default.to_string(),
    }
}

fn menu_train(trainer: &mut Trainer, input: &StdinWatcher) -> Result<()> {
    let name = ask_or(input, "Model name", DEFAULT_MODEL);
    let epochs: usize = ask_or(input, "Epochs", "500")
        .parse()
        .context("epochs must be a whole number")?;

    trainer.reset_models();
    let args = TrainArgs {
        name,
        epochs,
        batch_size: 64,
        max_steps: 500,
        resume: false,
        metrics_out: None,
    };
    train(trainer, input, &args)
}

fn menu_load(trainer: &mut Trainer, input: &StdinWatcher) -> Result<()> {
    let models = trainer.list_models()?;
    if models.is_empty() {
        println!("No saved models in {}", trainer.store().dir().display());
        return Ok(());
    }
    println!("Saved models: {}", models.join(", "));

    let name = ask_or(input, "Model name", DEFAULT_MODEL);
    match trainer.load_model(&name) {
        Ok(()) => Ok(()),
        Err(MazeError::ModelNotFound(path)) => {
            println!("No model at {}", path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn menu_play(trainer: &mut Trainer, input: &StdinWatcher) -> Result<()> {
    if !trainer.has_model() {
        println!("Train or load a model first.");
        return Ok(());
    }
    let default_start = trainer.maze().start();
    let start: Cell = ask_or(input, "Start cell (row,col)", &format!("{},{}", default_start.row, default_start.col))
        .parse()?;
    play(trainer, start, 500)
}
