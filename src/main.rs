use std::io::Write;

use clap::Parser;
use env_logger::{Builder, Env, Target};

mod cli;

use cli::{Cli, Subcommands};

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    Builder::from_env(Env::default().filter_or("RUST_LOG", level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(Target::Stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    match cli.command {
        Subcommands::Detect(args) => args.run(),
        Subcommands::Info(args) => args.run(),
        Subcommands::Dump(args) => args.run(),
        Subcommands::Show(args) => args.run(),
        Subcommands::Play(args) => args.run(),
    }
}
