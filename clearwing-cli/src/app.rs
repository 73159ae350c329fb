use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// clearwing - ahead-of-time transpiler from JVM class files to C++
#[derive(Debug, Parser)]
#[command(name = "clearwing", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Configuration sources shared by commands that run the pipeline.
#[derive(Debug, Parser)]
pub struct ConfigOptions {
    /// JSON configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Entry point class, overriding the configuration.
    #[arg(short, long, value_name = "CLASS")]
    pub main: Option<String>,

    /// Group instructions and emit them on named temporaries.
    #[arg(long)]
    pub optimize: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Transpile class files, directories and jars into C++ sources.
    Transpile {
        /// Class files, directories or jar archives.
        #[arg(short, long = "input", value_name = "PATH", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Java source directories scanned for native method bodies.
        #[arg(short, long = "source", value_name = "DIR", num_args = 1..)]
        sources: Vec<PathBuf>,

        /// Output directory.
        #[arg(short, long, value_name = "DIR")]
        output: PathBuf,

        #[command(flatten)]
        config: ConfigOptions,
    },

    /// List the classes found in the inputs.
    Classes {
        /// Class files, directories or jar archives.
        #[arg(short, long = "input", value_name = "PATH", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Show only classes matching this pattern (e.g., com.example.**).
        #[arg(long, value_name = "PATTERN")]
        filter: Option<String>,
    },

    /// Print the effective configuration as JSON.
    Config {
        /// Jar archives whose embedded configuration is merged in.
        #[arg(short, long = "input", value_name = "PATH", num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        config: ConfigOptions,
    },
}
