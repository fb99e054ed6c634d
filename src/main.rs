use clap::Parser;

mod cli;

use vault_router::{example, logging, run, schema, simulate, validate};

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::setup_logging(&cli.log_level, cli.log_json);

    match cli.command {
        cli::Command::Schema => schema::run(),
        cli::Command::Example => example::run(),
        cli::Command::Validate { file } => validate::run(&file),
        cli::Command::Simulate {
            file,
            state_file,
            output,
            verbose,
        } => simulate::run(&simulate::SimulateConfig {
            scenario_path: file,
            state_file,
            output,
            verbose,
        }),
        cli::Command::Stress { runs, steps, seed } => {
            simulate::stress::run(&simulate::stress::StressConfig { runs, steps, seed })
        }
        cli::Command::State { file } => run::show(&file),
    }
}
