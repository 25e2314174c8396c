use clap::Parser;
use hhga::{
    cli::{init_verbose, Cli, Command, FULL_VERSION},
    commands::{annotate, featurize},
    utils::{handle_error_and_exit, Result},
};

fn runner() -> Result<()> {
    let cli = Cli::parse();
    init_verbose(&cli);
    let subcommand_name = match cli.command {
        Command::Featurize(_) => "featurize",
        Command::Annotate(_) => "annotate",
    };

    log::info!(
        "Running {}-{} [{}]",
        env!("CARGO_PKG_NAME"),
        *FULL_VERSION,
        subcommand_name
    );
    match cli.command {
        Command::Featurize(args) => featurize::featurize(args)?,
        Command::Annotate(args) => annotate::annotate(args)?,
    }
    log::info!("{} end", env!("CARGO_PKG_NAME"));
    Ok(())
}

fn main() {
    if let Err(e) = runner() {
        handle_error_and_exit(e);
    }
}
