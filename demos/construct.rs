//! Builds the sample C project in `demos/testproj/`.
//!
//! ```sh
//! cargo run --example construct --features logging -- -C demos -j 4
//! ```

use std::process::ExitCode;

use clap::Parser;
use construct::{Blueprint, BuildError, Options};

#[derive(Parser, Debug, Clone)]
struct Args {
    /// Target to build.
    #[clap(index = 1, default_value = "testproj/main")]
    goal: String,
    /// Maximum number of commands running at once.
    #[clap(short, long, default_value_t = 2)]
    jobs: usize,
    /// Directory to build in.
    #[clap(short = 'C', long, default_value = "demos")]
    directory: String,
}

fn project() -> Blueprint {
    let mut project = Blueprint::new();
    project
        .target(
            "testproj/main",
            ["testproj/main.o", "testproj/hello.o", "testproj/mymath.o"],
            "cc -o $@ $^ && sleep 0.1",
        )
        .target(
            "testproj/main.o",
            ["testproj/main.c", "testproj/hello.h"],
            "cc -c -o $@ $< && sleep 0.1",
        )
        .target(
            "testproj/hello.o",
            ["testproj/hello.c", "testproj/hello.h"],
            "cc -c -o $@ $< && sleep 0.1",
        )
        .target(
            "testproj/mymath.o",
            ["testproj/mymath.c", "testproj/mymath.h"],
            "cc -c -o $@ $< && sleep 0.1",
        );
    project
}

fn run(args: &Args) -> Result<(), BuildError> {
    let options = Options::default()
        .jobs(args.jobs)
        .directory(args.directory.as_str());

    let diagnostics = project().build_with(&args.goal, &options)?;
    tracing::info!("{} commands ran", diagnostics.executed.len());
    print!("{}", diagnostics.render_timeline());

    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    construct::init_logging()?;
    let args = Args::parse();

    match run(&args) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            tracing::error!("{err}");
            Ok(ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1)))
        }
    }
}
