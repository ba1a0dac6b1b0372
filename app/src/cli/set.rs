//! Rule-set management commands.

use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Subcommand};

use sbm_config::RuleSetStore;

use crate::settings::AppSettings;

#[derive(ClapArgs, Debug)]
pub struct SetArgs {
    #[command(subcommand)]
    pub cmd: SetCmd,
}

#[derive(Subcommand, Debug)]
pub enum SetCmd {
    /// List rule-set names
    List,
    /// Print a set's rules as JSON
    Show { name: String },
    /// Rename a set (the default set is protected)
    Rename { old: String, new: String },
    /// Remove a set (the default set is protected)
    Remove { name: String },
}

pub fn run(args: SetArgs, settings: &AppSettings) -> Result<()> {
    settings.ensure_dirs()?;
    let mut store = RuleSetStore::open(settings.rule_sets())?;
    match args.cmd {
        SetCmd::List => {
            for name in store.set_names() {
                println!("{name}");
            }
            Ok(())
        }
        SetCmd::Show { name } => {
            let Some(rules) = store.rules(&name) else {
                bail!("no rule set named '{name}'");
            };
            println!("{}", serde_json::to_string_pretty(&rules)?);
            Ok(())
        }
        SetCmd::Rename { old, new } => {
            store.rename_set(&old, &new)?;
            println!("renamed '{old}' to '{new}'");
            Ok(())
        }
        SetCmd::Remove { name } => {
            store.remove_set(&name)?;
            println!("removed '{name}'");
            Ok(())
        }
    }
}
