use clap::Parser;

use crate::{
    core::{
        cli,
        configuration::{self, Configuration},
    },
    net::http_adapter::HttpAdapter,
};

/// boot up the application kernel
pub async fn boot() -> std::io::Result<Kernel> {
    let cli = cli::Cli::parse();

    let conf = configuration::load_configuration(&cli.configuration_path)
        .await
        .map_err(std::io::Error::other)?;

    Ok(Kernel::new(conf))
}

/// The application kernel, responsible for wiring configuration into
/// the network adapters.
pub struct Kernel {
    configuration: Configuration,
}

impl Kernel {
    pub fn new(configuration: Configuration) -> Self {
        Self { configuration }
    }

    pub fn setup_http_adapter(&self) -> HttpAdapter {
        HttpAdapter::new(&self.configuration)
    }
}
