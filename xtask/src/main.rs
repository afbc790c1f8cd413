use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tasks for the project", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Build,
    /// Run all tests
    Test,
    /// Run the CLI, passing the remaining arguments through
    Run {
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Lay out a camera root with one camera per image set
    Cameras {
        /// Directory to create
        #[arg(long, default_value = "cameras")]
        root: PathBuf,
        /// Camera label, repeat for more cameras
        #[arg(long = "camera", default_values = ["Front Camera", "Back Camera"])]
        cameras: Vec<String>,
        /// Frames copied into every camera
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },
}

fn cargo(args: &[&str], what: &str) -> Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{what} failed");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build => {
            println!("Building project...");
            cargo(&["build", "--workspace"], "Build")?;
        }
        Commands::Test => {
            println!("Testing project...");
            cargo(&["test", "--workspace"], "Test")?;
        }
        Commands::Run { args } => {
            println!("Running CLI...");
            let mut full = vec!["run", "-p", "qrscan-cli", "--"];
            full.extend(args.iter().map(String::as_str));
            cargo(&full, "Run")?;
        }
        Commands::Cameras {
            root,
            cameras,
            frames,
        } => {
            for (index, label) in cameras.iter().enumerate() {
                let dir = root.join(format!("cam{index}"));
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
                std::fs::write(dir.join("label"), label)?;

                for (n, frame) in frames.iter().enumerate() {
                    let ext = frame
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("png");
                    let target = dir.join(format!("frame{n:04}.{ext}"));
                    std::fs::copy(frame, &target)
                        .with_context(|| format!("failed to copy {}", frame.display()))?;
                }
                println!("{} -> {}", label, dir.display());
            }
        }
    }

    Ok(())
}
