use gruesome::config::Config;
use gruesome::host_terminal::TerminalHost;
use gruesome::interpreter::{Interpreter, RunState};
use gruesome::vm::Game;
use log::{debug, info};
use std::env;
use std::fs;
use std::process;

fn usage(program: &str) {
    println!("gruesome - Z-Machine version 3 interpreter");
    println!();
    println!("Usage: {} <story_file> [--config file.toml] [--seed N]", program);
    println!();
    println!("Set RUST_LOG=debug to trace execution.");
}

struct Args {
    story: String,
    config: Option<String>,
    seed: Option<u32>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut story = None;
    let mut config = None;
    let mut seed = None;
    let mut rest = args.iter().skip(1);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--config" => {
                config = Some(rest.next().ok_or("--config needs a file name")?.clone());
            }
            "--seed" => {
                let value = rest.next().ok_or("--seed needs a number")?;
                seed = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| format!("Invalid seed: {}", value))?,
                );
            }
            other if story.is_none() => story = Some(other.to_string()),
            other => return Err(format!("Unexpected argument: {}", other)),
        }
    }
    Ok(Args {
        story: story.ok_or("No story file given")?,
        config,
        seed,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let argv: Vec<String> = env::args().collect();
    if argv.len() < 2 {
        usage(&argv[0]);
        return Ok(());
    }
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            usage(&argv[0]);
            process::exit(2);
        }
    };

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if args.seed.is_some() {
        config.interpreter.seed = args.seed;
    }
    debug!("Configuration: {:?}", config);

    let data = match fs::read(&args.story) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Error: Cannot read story file '{}': {}", args.story, e);
            process::exit(1);
        }
    };

    let game = Game::from_memory(data)?;
    let host = TerminalHost::new(&config.terminal);
    let mut interpreter = Interpreter::with_config(game, host, &config.interpreter)?;

    match interpreter.run() {
        Ok(RunState::Quit) => {
            info!("Story quit after {} instructions", interpreter.instruction_count());
            Ok(())
        }
        Ok(state) => {
            // The terminal host only declines input at end of stdin
            info!("Input ended in state {:?}", state);
            println!();
            Ok(())
        }
        Err(e) => {
            eprintln!("\nError during execution: {}", e);
            Err(Box::new(e))
        }
    }
}
