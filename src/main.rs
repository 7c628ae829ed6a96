use colored::Colorize;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::new().filter("RJUST_LOG")).init();

    if let Err(e) = rjust::cli::run() {
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(e.exit_code());
    }
}
