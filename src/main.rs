use std::path::Path;

use clap::{CommandFactory, Parser};

use gcsfuse_spank::cli::{Cli, Commands};
use gcsfuse_spank::config::Config;
use gcsfuse_spank::conflict::check_mount_conflicts;
use gcsfuse_spank::exit_codes;
use gcsfuse_spank::format::format_spec_table;
use gcsfuse_spank::mount_spec::MountSpec;
use gcsfuse_spank::mountpoint::is_mountpoint;
use gcsfuse_spank::resolve::resolve_mount_list;

fn run_parse(list: &str, json: bool) -> i32 {
    let mut specs = Vec::new();
    for token in list.split(';') {
        match MountSpec::parse(token) {
            Ok(spec) => specs.push(spec),
            Err(e) => {
                eprintln!("{e}");
                return exit_codes::USAGE_ERROR;
            }
        }
    }
    if json {
        match serde_json::to_string_pretty(&specs) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Failed to serialize specs: {e}");
                return exit_codes::RUNTIME_ERROR;
            }
        }
    } else {
        println!("{}", format_spec_table(&specs));
    }
    exit_codes::SUCCESS
}

fn run_resolve(list: &str, cwd: Option<&Path>) -> i32 {
    match resolve_mount_list(list, cwd) {
        Ok(resolved) => {
            println!("{resolved}");
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            exit_codes::USAGE_ERROR
        }
    }
}

fn run_check(current: &str, new: &str) -> i32 {
    match check_mount_conflicts(current, new) {
        Ok(()) => {
            println!("No conflicts.");
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            exit_codes::USAGE_ERROR
        }
    }
}

fn run_probe(path: &Path) -> i32 {
    if is_mountpoint(path) {
        println!("{} is a mountpoint", path.display());
        exit_codes::SUCCESS
    } else {
        println!("{} is not a mountpoint", path.display());
        exit_codes::RUNTIME_ERROR
    }
}

fn run_completions(shell: clap_complete::Shell) -> i32 {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "gcsfuse-spank", &mut std::io::stdout());
    exit_codes::SUCCESS
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Parse { list, json } => run_parse(&list, json),
        Commands::Resolve { list, cwd } => run_resolve(&list, cwd.as_deref()),
        Commands::Check { current, new } => run_check(&current, &new),
        Commands::Probe { path } => run_probe(&path),
        Commands::Doctor => gcsfuse_spank::doctor::run_doctor(&Config::default()),
        Commands::Completions { shell } => run_completions(shell),
    };
    std::process::exit(code);
}
