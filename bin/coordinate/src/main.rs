mod demo;
mod worker;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn main() -> std::result::Result<(), BoxedError> {
    let commander = demo::register(worker::register(
        clap::Command::new("coordinate")
            .about("Concurrency coordination toolkit: process worker and demos")
            .arg_required_else_help(true)
            .arg(
                clap::Arg::new("log_level")
                    .long("log-level")
                    .global(true)
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(Level))
                    .default_value("info"),
            ),
    ));

    let matches = commander.get_matches();
    let level = matches
        .get_one::<Level>("log_level")
        .copied()
        .unwrap_or(Level::INFO);

    // stdout carries worker frames, so logs always go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match matches.subcommand() {
        Some(("worker", arguments)) => worker::run(arguments)?,
        Some(("demo", arguments)) => demo::run(arguments)?,
        _ => {}
    }

    Ok(())
}
