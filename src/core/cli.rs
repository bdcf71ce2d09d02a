use clap::{Parser, command};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the yaml configuration file
    #[arg(short, long, default_value = "conf.yaml")]
    pub configuration_path: String,
}
