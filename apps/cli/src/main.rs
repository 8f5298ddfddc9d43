mod args;
mod hooks;

use relay_engine::{
    HttpTransport, RelayPaths, RunOptions, default_claude_home, default_log_roots,
    init_debug_log, load_config, run_once,
};

use crate::args::Command;

/// The agent runs from the host assistant's post-session hook; a nonzero
/// exit would surface in the user's terminal, so every path exits 0.
fn main() {
    let args = match args::parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            args::print_help();
            return;
        }
    };

    match args.command {
        Command::Run => run_engine(args.dry_run),
        Command::InstallHook => manage_hook(true),
        Command::UninstallHook => manage_hook(false),
    }
}

fn run_engine(dry_run: bool) {
    let paths = RelayPaths::new(default_claude_home());
    let Some(config) = load_config(&paths.config_file()) else {
        return;
    };
    if !config.is_active() {
        return;
    }
    init_debug_log(&paths);

    let transport = match HttpTransport::new(&config.server_url, &config.username) {
        Ok(transport) => transport,
        Err(err) => {
            tracing::warn!(error = %err, "cannot build http client");
            return;
        }
    };
    let options = RunOptions {
        dry_run,
        ..Default::default()
    };
    let outcome = run_once(&paths, &default_log_roots(), &transport, &options);
    tracing::debug!(?outcome, "agent finished");
}

fn manage_hook(install: bool) {
    let settings_path = default_claude_home().join("settings.json");
    let command = match std::env::current_exe() {
        Ok(path) => path.to_string_lossy().to_string(),
        Err(err) => {
            eprintln!("cannot resolve current executable: {err}");
            return;
        }
    };
    let result = if install {
        hooks::install_hook(&settings_path, &command)
    } else {
        hooks::uninstall_hook(&settings_path, &command)
    };
    match (install, result) {
        (true, Ok(true)) => println!("Installed SessionEnd hook in {}.", settings_path.display()),
        (true, Ok(false)) => println!("SessionEnd hook already installed."),
        (false, Ok(true)) => println!("Removed SessionEnd hook from {}.", settings_path.display()),
        (false, Ok(false)) => println!("No SessionEnd hook to remove."),
        (_, Err(err)) => eprintln!("{err}"),
    }
}
