use std::env;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the collection-and-delivery engine once.
    #[default]
    Run,
    InstallHook,
    UninstallHook,
}

#[derive(Debug, Default)]
pub struct CliArgs {
    pub command: Command,
    pub dry_run: bool,
}

pub fn parse_args() -> Result<CliArgs, String> {
    let args = env::args().skip(1);
    let mut parsed = CliArgs::default();

    for arg in args {
        match arg.as_str() {
            "install-hook" => {
                parsed.command = Command::InstallHook;
            }
            "uninstall-hook" => {
                parsed.command = Command::UninstallHook;
            }
            "--dry-run" => {
                parsed.dry_run = true;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                return Err(format!("unknown argument: {arg}"));
            }
        }
    }

    Ok(parsed)
}

pub fn print_help() {
    println!(
        "usage-relay\n\n\
Usage:\n  usage-relay [--dry-run]\n  usage-relay install-hook\n  usage-relay uninstall-hook\n\n\
Options:\n  --dry-run      Collect and dedup without sending; survivors stay buffered\n  -h, --help     Show this help message\n"
    );
}
