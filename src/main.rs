#![allow(clippy::enum_variant_names)]
#![allow(clippy::module_inception)]

use clap::Parser as _;
use supports_color::Stream;
use tracing::debug;

use crate::{
    application::{Application, ApplicationError},
    cli::Cli,
};

mod application;
mod archive;
mod cli;
mod detection;
mod ext;
mod history;
mod orchestrator;
#[cfg(test)]
mod test_support;

#[compio::main]
#[snafu::report]
async fn main() -> Result<(), ApplicationError> {
    let cli_args = Cli::parse();
    setup_tracing(&cli_args);
    setup_colors();
    debug!("Parsed CLI arguments: {cli_args:?}");

    Application::run(cli_args).await?;

    Ok(())
}

fn setup_tracing(cli_args: &Cli) {
    if let Some(level) = cli_args.log_level.to_tracing_level() {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .without_time()
            .compact()
            .init();
    }
}

fn setup_colors() {
    if supports_color::on(Stream::Stdout).is_none() {
        colored::control::set_override(false);
    }
}
