//! Subscription lifecycle commands.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Subcommand};
use tracing::{info, warn};

use sbm_config::fsio;
use sbm_config::{
    new_subscription_id, passthrough, skeleton, synthesize, SubscriptionInfo, SubscriptionOrigin,
    SubscriptionStore,
};
use sbm_subscribe::{parse, ContentKind};

use crate::fetch::fetch_subscription;
use crate::settings::AppSettings;

#[derive(ClapArgs, Debug)]
pub struct SubArgs {
    #[command(subcommand)]
    pub cmd: SubCmd,
}

#[derive(Subcommand, Debug)]
pub enum SubCmd {
    /// Register a subscription and generate its config
    Add {
        name: String,
        /// Provider URL; omit when pasting content via --file
        #[arg(long)]
        url: Option<String>,
        /// File holding manual content (links, JSON nodes or a document)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Keep the fetched document verbatim apart from the port overlay
        #[arg(long)]
        use_original: bool,
        /// Refresh cadence in minutes, 0 = manual only
        #[arg(long, default_value_t = 0)]
        refresh_min: u32,
    },
    /// List registered subscriptions
    List,
    /// Re-fetch content and regenerate the config
    Refresh { name: String },
    /// Copy a subscription's generated config over the active one
    Use { name: String },
    /// Delete a subscription and its generated files
    Remove { name: String },
}

pub fn run(args: SubArgs, settings: &AppSettings) -> Result<()> {
    settings.ensure_dirs()?;
    let mut store = SubscriptionStore::open(settings.subscriptions())?;
    match args.cmd {
        SubCmd::Add {
            name,
            url,
            file,
            use_original,
            refresh_min,
        } => {
            let (origin, manual_content) = match (url, file) {
                (Some(u), None) => (SubscriptionOrigin::Url(u), String::new()),
                (None, Some(f)) => {
                    let content = fs::read_to_string(&f)
                        .with_context(|| format!("reading {}", f.display()))?;
                    (SubscriptionOrigin::Manual, content)
                }
                _ => bail!("exactly one of --url and --file is required"),
            };
            let id = new_subscription_id(&name);
            let config_path = settings.sub_config(&id);
            let info = SubscriptionInfo {
                id,
                name: name.clone(),
                origin,
                manual_content,
                use_original_config: use_original,
                backup_path: fsio::backup_path(&config_path),
                config_path,
                refresh_interval_min: refresh_min,
                usage: Default::default(),
                expire_at: None,
            };
            store.add(info)?;
            refresh(&mut store, &name, settings)
        }
        SubCmd::List => {
            for s in store.list() {
                let origin = match &s.origin {
                    SubscriptionOrigin::Url(u) => u.as_str(),
                    SubscriptionOrigin::Manual => "(manual)",
                };
                println!(
                    "{}\t{}\t{}\tused {}/{} bytes",
                    s.name,
                    origin,
                    s.config_path.display(),
                    s.usage.upload + s.usage.download,
                    s.usage.total,
                );
            }
            Ok(())
        }
        SubCmd::Refresh { name } => refresh(&mut store, &name, settings),
        SubCmd::Use { name } => {
            let info = store
                .find(&name)
                .with_context(|| format!("no subscription named '{name}'"))?;
            let body = fs::read_to_string(&info.config_path)
                .with_context(|| format!("reading {}", info.config_path.display()))?;
            fsio::save_with_backup(&settings.active_config(), body.as_bytes())?;
            println!("active config now follows '{}'", info.name);
            Ok(())
        }
        SubCmd::Remove { name } => {
            store.remove(&name)?;
            println!("removed '{name}'");
            Ok(())
        }
    }
}

fn refresh(store: &mut SubscriptionStore, name: &str, settings: &AppSettings) -> Result<()> {
    let info = store
        .find(name)
        .with_context(|| format!("no subscription named '{name}'"))?
        .clone();

    let (body, usage) = match &info.origin {
        SubscriptionOrigin::Url(url) => {
            let fetched = fetch_subscription(url)?;
            (fetched.body, fetched.usage)
        }
        SubscriptionOrigin::Manual => (info.manual_content.clone(), None),
    };

    let doc = if info.use_original_config {
        passthrough(&body, &settings.overlay)?
    } else {
        let parsed = parse(&body, ContentKind::Auto)?;
        if parsed.skipped > 0 {
            warn!(skipped = parsed.skipped, sub = name, "some subscription lines were unusable");
        }
        if parsed.is_empty() {
            bail!("subscription '{name}' yielded no usable nodes");
        }
        synthesize(skeleton(), &parsed.nodes, &settings.overlay)?
    };

    let text = serde_json::to_string_pretty(&doc)?;
    fsio::save_with_backup(&info.config_path, text.as_bytes())?;
    info!(sub = name, path = %info.config_path.display(), "config generated");

    if let Some((counters, expire)) = usage {
        store.record_usage(name, counters, expire)?;
    }
    println!("generated {}", info.config_path.display());
    Ok(())
}
