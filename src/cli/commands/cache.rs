//! Cookie cache commands.

use console::style;

use crate::cache::CookieCache;
use crate::config::Config;

use super::super::icons;

fn open_cache(config: &Config) -> anyhow::Result<CookieCache> {
    Ok(CookieCache::new(
        config.cookie_cache_path(),
        config.query.scholar_host()?,
    ))
}

/// List the cached Scholar cookies.
pub fn cmd_cache_show(config: &Config) -> anyhow::Result<()> {
    let cache = open_cache(config)?;
    let cookies = cache.load()?;

    println!(
        "{} {}",
        icons::info(),
        style(cache.path().display()).bold()
    );
    if cookies.is_empty() {
        println!("{} No cached cookies", icons::warn());
        return Ok(());
    }

    for cookie in &cookies {
        let expiry = match cookie.expiry {
            Some(ts) => format!("expires {}", ts),
            None => "session".to_string(),
        };
        println!(
            "  {} {:<20} {:<28} {}",
            icons::bullet(),
            cookie.name,
            cookie.domain,
            style(expiry).dim()
        );
    }
    Ok(())
}

/// Delete the cookie cache file.
pub fn cmd_cache_clear(config: &Config) -> anyhow::Result<()> {
    let cache = open_cache(config)?;
    if cache.clear()? {
        println!(
            "{} Removed {}",
            icons::success(),
            cache.path().display()
        );
    } else {
        println!("{} No cookie cache at {}", icons::info(), cache.path().display());
    }
    Ok(())
}
