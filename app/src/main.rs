//! sbm — sing-box manager CLI.
//! 订阅、规则集与活动配置的命令行入口。

mod cli;
mod fetch;
mod logging;
mod settings;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    logging::init();
    let args = cli::Args::parse();
    let settings = settings::AppSettings::load(&args.settings)?;

    match args.command {
        cli::Commands::Sub(a) => cli::sub::run(a, &settings),
        cli::Commands::Rule(a) => cli::rule::run(a, &settings),
        cli::Commands::Set(a) => cli::set::run(a, &settings),
        cli::Commands::Rollback => cli::rollback(&settings),
    }
}
