//! Strategy resolution command.

use console::style;

use crate::config::Config;
use crate::strategy::{StrategyLoader, StrategyResolver, ADJUSTER_LIST_FILE};

use super::super::icons;

/// Print the strategy each URL resolves to without launching a browser.
pub fn cmd_resolve(config: &Config, urls: &[String]) -> anyhow::Result<()> {
    let resources = config.resources_dir();
    let resolver = StrategyResolver::load(
        &resources.join(ADJUSTER_LIST_FILE),
        config.query.path_candidates,
    )?;
    let loader = StrategyLoader::new(&resources);

    let mut unresolved = 0;
    for url in urls {
        match resolver.resolve(url) {
            Ok(name) => match loader.load(&name) {
                Ok(_) => println!("{} {} {}", icons::success(), url, style(name).bold()),
                Err(e) => println!(
                    "{} {} {} ({})",
                    icons::warn(),
                    url,
                    style(name).bold(),
                    e
                ),
            },
            Err(e) => {
                unresolved += 1;
                println!("{} {} {}", icons::error(), url, style(e).dim());
            }
        }
    }

    if unresolved > 0 {
        anyhow::bail!("{} URL(s) have no extraction strategy", unresolved);
    }
    Ok(())
}
