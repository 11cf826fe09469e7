//! swfrc - SWF action translator and runner
//!
//! Translates action bytecode to Rust, plays it frame by frame, or runs
//! hex-encoded actions interactively.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::info;
use regex::Regex;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use swfrecomp::vm::Player;
use swfrecomp::{Config, Context, Interpreter, RuntimeError, TranslateError, Translator};

#[derive(Parser)]
#[command(name = "swfrc", version, about = "Translate and run SWF action bytecode")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate frame scripts to Rust source
    Translate {
        /// One action file per frame
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Inputs are hex text
        #[arg(long)]
        hex: bool,
    },
    /// Play frame scripts with the interpreter
    Run {
        /// One action file per frame
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Inputs are hex text
        #[arg(long)]
        hex: bool,

        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Read hex-encoded actions and run them line by line
    Repl {
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
}

#[derive(Args)]
struct RuntimeArgs {
    /// Fixed random seed
    #[arg(long)]
    seed: Option<u32>,

    /// Operand stack capacity in values
    #[arg(long)]
    stack: Option<usize>,

    /// Maximum frames to play
    #[arg(long)]
    frames: Option<usize>,

    /// Live cell limit per heap arena
    #[arg(long)]
    heap_limit: Option<usize>,

    /// Instruction budget per script run
    #[arg(long)]
    max_instructions: Option<u64>,
}

impl RuntimeArgs {
    fn config(&self) -> Config {
        let mut config = Config {
            random_seed: self.seed,
            heap_limit: self.heap_limit,
            instruction_limit: self.max_instructions,
            ..Config::default()
        };
        if let Some(stack) = self.stack {
            config.stack_capacity = stack;
        }
        if let Some(frames) = self.frames {
            config.max_frames = frames;
        }
        config
    }
}

#[derive(Debug)]
enum CliError {
    Io(PathBuf, std::io::Error),
    Hex(String),
    Translate(TranslateError),
    Runtime(RuntimeError),
    Readline(ReadlineError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(path, e) => write!(f, "{}: {}", path.display(), e),
            CliError::Hex(msg) => write!(f, "bad hex input: {}", msg),
            CliError::Translate(e) => write!(f, "translation failed: {}", e),
            CliError::Runtime(e) => write!(f, "runtime error: {}", e),
            CliError::Readline(e) => write!(f, "input error: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<TranslateError> for CliError {
    fn from(e: TranslateError) -> Self {
        CliError::Translate(e)
    }
}

impl From<RuntimeError> for CliError {
    fn from(e: RuntimeError) -> Self {
        CliError::Runtime(e)
    }
}

impl From<ReadlineError> for CliError {
    fn from(e: ReadlineError) -> Self {
        CliError::Readline(e)
    }
}

/// Decode hex text; whitespace, commas, `0x` prefixes and `#` comments are ignored
fn decode_hex(text: &str) -> Result<Vec<u8>, CliError> {
    let noise = Regex::new(r"(?m)#.*$|0[xX]|[\s,]").map_err(|e| CliError::Hex(e.to_string()))?;
    let digits = noise.replace_all(text, "");
    if digits.len() % 2 != 0 {
        return Err(CliError::Hex(format!("odd number of digits ({})", digits.len())));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = digits.get(i..i + 2).unwrap_or("");
            u8::from_str_radix(pair, 16).map_err(|_| CliError::Hex(format!("invalid byte {:?}", pair)))
        })
        .collect()
}

fn read_input(path: &Path, hex: bool) -> Result<Vec<u8>, CliError> {
    if hex {
        let text = fs::read_to_string(path).map_err(|e| CliError::Io(path.to_path_buf(), e))?;
        decode_hex(&text)
    } else {
        fs::read(path).map_err(|e| CliError::Io(path.to_path_buf(), e))
    }
}

fn read_inputs(paths: &[PathBuf], hex: bool) -> Result<Vec<Vec<u8>>, CliError> {
    paths.iter().map(|p| read_input(p, hex)).collect()
}

fn translate(inputs: &[PathBuf], output: Option<&Path>, hex: bool) -> Result<(), CliError> {
    let scripts = read_inputs(inputs, hex)?;
    let source = Translator::new().translate_to_rust(&scripts)?;
    match output {
        Some(path) => {
            fs::write(path, source).map_err(|e| CliError::Io(path.to_path_buf(), e))?;
            info!("wrote {}", path.display());
        }
        None => print!("{}", source),
    }
    Ok(())
}

fn run(inputs: &[PathBuf], hex: bool, config: Config) -> Result<(), CliError> {
    let scripts = read_inputs(inputs, hex)?;
    let program = Translator::new().translate_scripts(&scripts)?;
    let mut ctx = Context::new(config);
    let summary = Player::new(program).play(&mut ctx)?;
    info!(
        "played {} frames, stopped on frame {} ({:?})",
        summary.frames_run,
        summary.last_frame + 1,
        summary.reason
    );
    let leaked = ctx.shutdown();
    if leaked > 0 {
        info!("{} heap cells still live at shutdown", leaked);
    }
    Ok(())
}

fn repl(config: Config) -> Result<(), CliError> {
    println!("swfrc {} - enter hex-encoded actions, .stats for memory, Ctrl+D to exit", env!("CARGO_PKG_VERSION"));
    let mut editor = DefaultEditor::new()?;
    let mut translator = Translator::new();
    let mut ctx = Context::new(config);

    loop {
        let line = match editor.readline("swf> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        // History failures are not worth stopping for
        let _ = editor.add_history_entry(line);

        match line {
            ".quit" | ".exit" => break,
            ".stats" => {
                let stats = ctx.memory_stats();
                println!("live cells: {}, refused allocations: {}", stats.live(), stats.oom_count());
                continue;
            }
            _ => {}
        }

        let result = decode_hex(line).and_then(|mut code| {
            code.push(0);
            let program = translator.translate(&code)?;
            Interpreter::new(program).run_script(&mut ctx, 0)?;
            ctx.flush_output()?;
            Ok(())
        });
        if let Err(e) = result {
            eprintln!("error: {}", e);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match &cli.command {
        Command::Translate { inputs, output, hex } => translate(inputs, output.as_deref(), *hex),
        Command::Run { inputs, hex, runtime } => run(inputs, *hex, runtime.config()),
        Command::Repl { runtime } => repl(runtime.config()),
    };

    if let Err(e) = result {
        eprintln!("swfrc: {}", e);
        std::process::exit(1);
    }
}
