use clap::Parser;
use emc_model::config::ModelConfig;
use emc_model::factory::ModelFactory;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
struct Args {
    /// path to model parameters file to write
    parameter_file: PathBuf,
    /// model to configure
    #[arg(long, default_value = "avg")]
    model: String,
}

fn main() -> ExitCode {
    if let Err(e) = emc_model::logging::init() {
        eprintln!("{e}");
    }
    let args = Args::parse();

    if !ModelFactory::supported().any(|key| key == args.model.to_ascii_lowercase()) {
        tracing::error!(
            "unsupported model '{}', expected one of {:?}",
            args.model,
            ModelFactory::supported().collect::<Vec<_>>()
        );
        return ExitCode::FAILURE;
    }

    let params = ModelConfig { model: args.model, ..Default::default() };
    let filename = args.parameter_file.with_extension("toml");
    match params.to_file(&filename) {
        Ok(()) => {
            tracing::info!("wrote default parameter file to {}", filename.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
