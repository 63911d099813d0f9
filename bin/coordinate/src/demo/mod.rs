//! One subcommand per coordination primitive, each driving the shared
//! workload through it and logging what happened.

mod lifecycle;
mod locks;
mod pipes;
mod processes;
mod signals;

use std::path::PathBuf;

use foundation_tasks::{run_in_process, CoordinationConfig, TaskError};
use foundation_workload::{Task, WorkResult};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

const DEMOS: [&str; 13] = [
    "lock",
    "rlock",
    "semaphore",
    "barrier",
    "condition",
    "event",
    "queue",
    "pipe",
    "pool",
    "kill",
    "daemon",
    "compare",
    "spawn",
];

const ISOLATIONS: [&str; 2] = ["thread", "process"];

/// Where demos that support both run each task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    Thread,
    Process,
}

impl Isolation {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "thread" => Some(Self::Thread),
            "process" => Some(Self::Process),
            _ => None,
        }
    }
}

/// Settings every demo reads.
pub struct DemoContext {
    pub size: i64,
    pub isolation: Isolation,
    pub config: CoordinationConfig,
}

impl DemoContext {
    /// The workload size for a task `factor` times the base size.
    pub fn scaled(&self, factor: i64) -> i64 {
        self.size.saturating_mul(factor)
    }

    /// The binary serving `worker` requests: the configured one, else this
    /// executable.
    pub fn worker_program(&self) -> Result<PathBuf, TaskError> {
        match self.config.program() {
            Some(program) => Ok(program.clone()),
            None => std::env::current_exe().map_err(TaskError::Spawn),
        }
    }

    /// Runs `task` on the calling thread or in a fresh worker process.
    pub fn run_task(&self, task: Task) -> Result<WorkResult, TaskError> {
        match self.isolation {
            Isolation::Thread => Ok(task.run()?),
            Isolation::Process => run_in_process(&self.worker_program()?, task),
        }
    }
}

pub fn register(command: clap::Command) -> clap::Command {
    command.subcommand(
        clap::Command::new("demo")
            .about("runs one coordination demo over the prime/trigonometry workload")
            .arg(
                clap::Arg::new("name")
                    .required(true)
                    .action(clap::ArgAction::Set)
                    .value_parser(DEMOS),
            )
            .arg(
                clap::Arg::new("size")
                    .short('s')
                    .long("size")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(i64).range(0..))
                    .default_value("100000"),
            )
            .arg(
                clap::Arg::new("workers")
                    .short('w')
                    .long("workers")
                    .action(clap::ArgAction::Set)
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                clap::Arg::new("isolation")
                    .short('i')
                    .long("isolation")
                    .help("run tasks of the queue, pipe and pool demos in threads or worker processes")
                    .action(clap::ArgAction::Set)
                    .value_parser(ISOLATIONS)
                    .default_value("thread"),
            )
            .arg_required_else_help(true),
    )
}

pub fn run(args: &clap::ArgMatches) -> std::result::Result<(), BoxedError> {
    let Some(name) = args.get_one::<String>("name") else {
        return Err("a demo name is required".into());
    };
    let size = args.get_one::<i64>("size").copied().unwrap_or(100_000);

    let mut config = CoordinationConfig::from_env();
    if let Some(workers) = args.get_one::<usize>("workers") {
        config = config.workers(*workers);
    }
    let isolation = args
        .get_one::<String>("isolation")
        .and_then(|raw| Isolation::parse(raw))
        .unwrap_or(Isolation::Thread);
    let context = DemoContext {
        size,
        isolation,
        config,
    };

    tracing::info!(
        demo = %name,
        size,
        ?isolation,
        workers = context.config.worker_count(),
        "starting demo"
    );
    match name.as_str() {
        "lock" => locks::lock(&context)?,
        "rlock" => locks::rlock(&context)?,
        "semaphore" => signals::semaphore(&context)?,
        "barrier" => signals::barrier(&context)?,
        "condition" => signals::condition(&context)?,
        "event" => signals::event(&context)?,
        "queue" => pipes::queue(&context)?,
        "pipe" => pipes::pipe(&context)?,
        "pool" => pipes::pool(&context)?,
        "kill" => lifecycle::kill(&context)?,
        "daemon" => lifecycle::daemon(&context)?,
        "compare" => processes::compare(&context)?,
        "spawn" => processes::spawn(&context)?,
        other => return Err(format!("unknown demo {other}").into()),
    }
    tracing::info!(demo = %name, "demo finished");
    Ok(())
}
