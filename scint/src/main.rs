mod cli;
mod install_run;

use tui::Stylize;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let _runtime = scint_core::runtime::init();

    if let Err(error) = cli::process() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(error.status_code());
    }
}
