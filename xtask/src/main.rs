use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "x")]
#[command(about = "Development automation for ps2rx")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// fmt check, clippy, then the whole test suite
    Ci {
        /// Print the time taken by each step
        #[arg(long)]
        verbose: bool,
    },
    /// fmt check and lib tests, for a git pre-commit hook
    PreCommit,
    /// Format the workspace
    Fmt {
        #[arg(long)]
        check: bool,
    },
    /// Lint every target with warnings denied
    Clippy {
        #[arg(long)]
        fix: bool,
    },
    /// Run tests, optionally limited to one core module
    Test {
        /// Only run doc tests
        #[arg(long)]
        doc: bool,
        /// Only run unit tests of one module
        #[arg(short, long, value_enum)]
        module: Option<Module>,
    },
    /// Run the criterion benches
    Bench {
        /// Bench name filter, e.g. `chain_walk`
        filter: Option<String>,
    },
    /// Replay a DMA transfer from a raw EE RAM image
    Replay {
        /// Raw image loaded into EE RAM
        image: String,
        /// Channel number (0-9)
        #[arg(short = 'c', long, default_value = "2")]
        channel: usize,
        /// TADR of the first tag
        #[arg(long, default_value = "0")]
        tadr: String,
        /// EE cycle budget
        #[arg(short = 'n', long, default_value = "1000000")]
        cycles: u64,
        #[arg(long)]
        release: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Module {
    Dma,
    Fifo,
    Gif,
    Sif,
    Interrupt,
    Timing,
    System,
}

impl Module {
    fn path(self) -> &'static str {
        match self {
            Module::Dma => "core::dma",
            Module::Fifo => "core::fifo",
            Module::Gif => "core::gif",
            Module::Sif => "core::sif",
            Module::Interrupt => "core::interrupt",
            Module::Timing => "core::timing",
            Module::System => "core::system",
        }
    }
}

/// One named `cargo` invocation of a pipeline
struct Step {
    name: &'static str,
    args: &'static [&'static str],
}

const FMT_CHECK: Step = Step {
    name: "Format Check",
    args: &["fmt", "--all", "--", "--check"],
};

const CLIPPY: Step = Step {
    name: "Clippy",
    args: &["clippy", "--all-targets", "--", "-D", "warnings"],
};

const CI: &[Step] = &[
    FMT_CHECK,
    CLIPPY,
    Step {
        name: "Tests",
        args: &["test", "--workspace"],
    },
];

const PRE_COMMIT: &[Step] = &[
    FMT_CHECK,
    Step {
        name: "Lib Tests",
        args: &["test", "--lib"],
    },
];

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Ci { verbose } => run_pipeline("CI", CI, verbose),
        Commands::PreCommit => run_pipeline("Pre-commit", PRE_COMMIT, false),
        Commands::Fmt { check } => {
            if check {
                cargo(FMT_CHECK.args)
            } else {
                cargo(&["fmt", "--all"])
            }
        }
        Commands::Clippy { fix } => {
            if fix {
                cargo(&["clippy", "--all-targets", "--fix", "--allow-dirty"])
            } else {
                cargo(CLIPPY.args)
            }
        }
        Commands::Test { doc, module } => run_test(doc, module),
        Commands::Bench { filter } => {
            let mut args = vec!["bench", "--bench", "dma_bench"];
            if let Some(filter) = filter.as_deref() {
                args.extend(["--", filter]);
            }
            cargo(&args)
        }
        Commands::Replay {
            image,
            channel,
            tadr,
            cycles,
            release,
        } => run_replay(&image, channel, &tadr, cycles, release),
    }
}

fn run_pipeline(title: &str, steps: &[Step], verbose: bool) -> Result<()> {
    println!("{}", format!("=== {} ===", title).bold().blue());
    let start = Instant::now();

    for step in steps {
        print!("{} {} ... ", "→".blue(), step.name);
        let step_start = Instant::now();
        if let Err(e) = cargo(step.args) {
            println!("{}", "✗".red().bold());
            return Err(e);
        }
        if verbose {
            println!(
                "{} ({:.2}s)",
                "✓".green().bold(),
                step_start.elapsed().as_secs_f64()
            );
        } else {
            println!("{}", "✓".green().bold());
        }
    }

    println!(
        "\n{} {}",
        format!("✓ {} passed in", title).green().bold(),
        format!("{:.2}s", start.elapsed().as_secs_f64()).bold()
    );
    Ok(())
}

fn run_test(doc: bool, module: Option<Module>) -> Result<()> {
    match (doc, module) {
        (true, _) => cargo(&["test", "--doc"]),
        (false, Some(module)) => {
            println!("{} Running {} tests", "→".blue(), module.path().bold());
            cargo(&["test", "--lib", module.path()])
        }
        (false, None) => cargo(&["test", "--workspace"]),
    }
}

fn run_replay(image: &str, channel: usize, tadr: &str, cycles: u64, release: bool) -> Result<()> {
    if !Path::new(image).exists() {
        bail!("image not found: {}", image);
    }
    if channel > 9 {
        bail!("channel must be 0-9 (got {})", channel);
    }

    println!(
        "{} Replaying {} on channel {} from TADR {}",
        "→".blue(),
        image.cyan(),
        channel.to_string().bold(),
        tadr.bold()
    );

    let channel = channel.to_string();
    let cycles = cycles.to_string();
    let mut args = vec!["run"];
    if release {
        args.push("--release");
    }
    args.extend([
        "--bin", "ps2rx", "--", image, "--channel", &channel, "--tadr", tadr, "-n", &cycles,
    ]);
    cargo(&args)
}

fn cargo(args: &[&str]) -> Result<()> {
    let status = Command::new("cargo")
        .args(args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    if !status.success() {
        bail!("cargo {} failed: {}", args.join(" "), status);
    }
    Ok(())
}
