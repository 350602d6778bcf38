// lowmemd - entry point

use std::process;

use lowmemd::config::{Args, Config};
use lowmemd::daemon;
use lowmemd::error::FatalError;

fn setup_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

fn run(args: Args) -> Result<(), FatalError> {
    let config = Config::from_args(args)?;
    daemon::run(config)
}

fn main() {
    let args = Args::parse_args();
    setup_logging(args.debug);

    // Every fatal condition funnels through here: one diagnostic line on
    // stderr, one stable exit code per condition.
    if let Err(e) = run(args) {
        eprintln!("lowmemd: {e}");
        process::exit(e.exit_code());
    }
}
