use clap::{Parser, Subcommand, Args};

#[derive(Parser)]
#[command(name = "vulndesk", version, about = "Vulnerability exception request service and scanner dashboard backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve(ServeArgs),
    /// Load directory users from a JSON export
    Seed(SeedArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the listen address
    #[arg(long)]
    pub host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Clone)]
pub struct SeedArgs {
    /// JSON file containing an array of directory users
    pub file: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<String>,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Config file to validate
    pub config: String,
}
