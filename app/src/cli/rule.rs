//! Route-rule editing against the active configuration document.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Subcommand};

use sbm_config::{
    find_owning_set, RuleEditData, RuleItem, RuleMutator, RuleSetStore, DEFAULT_SET, RULE_FIELDS,
};

use crate::settings::AppSettings;

#[derive(ClapArgs, Debug)]
pub struct RuleArgs {
    #[command(subcommand)]
    pub cmd: RuleCmd,
}

#[derive(Subcommand, Debug)]
pub enum RuleCmd {
    /// Print the match-field catalog
    Fields,
    /// Add a rule to the active config and a rule set
    Add {
        /// Match key, e.g. domain_suffix or port
        key: String,
        /// Match values
        #[arg(num_args = 1..)]
        values: Vec<String>,
        /// Outbound tag the rule routes to
        #[arg(long)]
        outbound: String,
        /// Target rule set (default set when omitted)
        #[arg(long, default_value = "")]
        set: String,
    },
    /// Replace an existing rule, identified by its displayed payload
    Update {
        /// Payload of the rule being replaced, e.g. "domain_suffix=a.com,b.com"
        #[arg(long)]
        old_payload: String,
        /// Outbound label shown with the old rule
        #[arg(long)]
        old_proxy: String,
        key: String,
        #[arg(num_args = 1..)]
        values: Vec<String>,
        #[arg(long)]
        outbound: String,
        #[arg(long, default_value = "")]
        set: String,
    },
    /// Remove a rule identified by its displayed payload
    Remove {
        payload: String,
        #[arg(long)]
        proxy: String,
    },
    /// Report which rule set owns a displayed rule
    Lookup {
        payload: String,
        #[arg(long)]
        proxy: String,
    },
}

pub fn run(args: RuleArgs, settings: &AppSettings) -> Result<()> {
    settings.ensure_dirs()?;
    let mut store = RuleSetStore::open(settings.rule_sets())?;
    match args.cmd {
        RuleCmd::Fields => {
            for f in RULE_FIELDS {
                let kind = if f.numeric { "number" } else { "string" };
                println!("{:<20} {:<10} {}", f.key, kind, f.label);
            }
            Ok(())
        }
        RuleCmd::Add {
            key,
            values,
            outbound,
            set,
        } => {
            let edit = RuleEditData {
                key,
                values,
                outbound,
                target_set: set,
            };
            RuleMutator::new(settings.active_config(), &mut store).add(&edit)?;
            println!("rule added to set '{}'", edit.target_set());
            Ok(())
        }
        RuleCmd::Update {
            old_payload,
            old_proxy,
            key,
            values,
            outbound,
            set,
        } => {
            let old = item(old_payload, old_proxy);
            let edit = RuleEditData {
                key,
                values,
                outbound,
                target_set: set,
            };
            RuleMutator::new(settings.active_config(), &mut store)
                .update(&old, &edit)
                .context("updating rule")?;
            println!("rule updated in set '{}'", edit.target_set());
            Ok(())
        }
        RuleCmd::Remove { payload, proxy } => {
            RuleMutator::new(settings.active_config(), &mut store).remove(&item(payload, proxy))?;
            println!("rule removed");
            Ok(())
        }
        RuleCmd::Lookup { payload, proxy } => {
            let owner = find_owning_set(store.document(), &item(payload, proxy));
            println!("{}", owner_label(owner.as_deref()));
            Ok(())
        }
    }
}

/// An unmatched rule belongs to the implicit built-in set, which is not
/// the same thing as a user-defined set named "default".
fn owner_label(owner: Option<&str>) -> String {
    match owner {
        Some(name) => name.to_string(),
        None => format!("{DEFAULT_SET} (built-in)"),
    }
}

fn item(payload: String, proxy: String) -> RuleItem {
    RuleItem {
        payload,
        proxy,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmatched_rules_report_the_built_in_set() {
        assert_eq!(owner_label(None), "default (built-in)");
        assert_eq!(owner_label(Some("default")), "default");
        assert_eq!(owner_label(Some("work")), "work");
    }
}
