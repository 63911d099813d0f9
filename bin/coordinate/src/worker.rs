use foundation_sync::StreamEndpoint;
use foundation_tasks::{serve_worker, WORKER_SUBCOMMAND};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new(WORKER_SUBCOMMAND)
            .about("serves workload requests read as JSON lines from stdin, replying on stdout"),
    )
}

pub fn run(_args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let mut endpoint = StreamEndpoint::stdio();
    let served = serve_worker(&mut endpoint)?;
    tracing::debug!(served, pid = std::process::id(), "worker exiting");
    Ok(())
}
