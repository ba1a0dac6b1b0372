pub mod rule;
pub mod set;
pub mod sub;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::settings::AppSettings;

#[derive(Parser, Debug)]
#[command(name = "sbm")]
#[command(about = "sing-box manager: subscriptions, rule sets and config synthesis", long_about = None)]
pub struct Args {
    /// Settings file (JSON); defaults apply when the file is absent
    #[arg(long, global = true, default_value = "sbm-settings.json")]
    pub settings: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Subscription lifecycle: add / list / refresh / use / remove
    Sub(sub::SubArgs),
    /// Route-rule editing against the active configuration
    Rule(rule::RuleArgs),
    /// Rule-set management
    Set(set::SetArgs),
    /// Restore the active configuration from its .bak copy
    Rollback,
}

pub fn rollback(settings: &AppSettings) -> Result<()> {
    sbm_config::fsio::rollback_from_backup(&settings.active_config())?;
    println!("restored {}", settings.active_config().display());
    Ok(())
}
