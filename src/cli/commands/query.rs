//! BibTeX lookup command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::browser::ChromiumLauncher;
use crate::config::Config;
use crate::query::BibQuery;

use super::super::helpers::{collect_urls, write_entries};
use super::super::icons;

pub struct QueryOptions {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub visible: bool,
    pub no_scholar: bool,
    pub no_recovery: bool,
}

/// Look up BibTeX entries and print them in input order.
pub async fn cmd_query(
    mut config: Config,
    args: &[String],
    options: QueryOptions,
) -> anyhow::Result<()> {
    let urls = collect_urls(args, options.input.as_deref())?;
    if urls.is_empty() {
        anyhow::bail!("No URLs given. Pass URLs as arguments or use --input FILE");
    }

    if options.visible {
        config.browser.headless = false;
    }
    if options.no_scholar {
        config.query.scholar = false;
    }
    if options.no_recovery {
        config.query.recovery = false;
    }

    let launcher = Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let mut bibquery = BibQuery::new(&config, launcher)?;
    bibquery.initialize().await?;

    let outcome = if urls.len() == 1 {
        run_single(&mut bibquery, &urls[0], options.output.as_ref()).await
    } else {
        run_batch(&mut bibquery, &urls, options.output.as_ref()).await
    };

    if let Err(e) = bibquery.close().await {
        eprintln!("{} Failed to close browser: {}", icons::warn(), e);
    }
    outcome
}

async fn run_single(
    bibquery: &mut BibQuery,
    url: &str,
    output: Option<&PathBuf>,
) -> anyhow::Result<()> {
    match bibquery.query(url).await {
        Ok(bibtex) => write_entries(&[bibtex.as_str()], output.map(PathBuf::as_path)),
        Err(e) => {
            eprintln!("{} {}", icons::error(), e.detail());
            Err(e.into())
        }
    }
}

async fn run_batch(
    bibquery: &mut BibQuery,
    urls: &[String],
    output: Option<&PathBuf>,
) -> anyhow::Result<()> {
    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let results = bibquery
        .query_batch_with(urls, |url, outcome| {
            pb.inc(1);
            match outcome {
                Ok(_) => pb.set_message(url.to_string()),
                Err(e) => pb.println(format!("{} {}: {}", icons::error(), url, e)),
            }
        })
        .await?;
    pb.finish_and_clear();

    let entries: Vec<&str> = urls
        .iter()
        .filter_map(|url| results.get(url).map(String::as_str))
        .collect();
    write_entries(&entries, output.map(PathBuf::as_path))?;

    let failed = urls.iter().filter(|u| !results.contains_key(*u)).count();
    if failed > 0 {
        eprintln!(
            "{} Retrieved {} of {} entries",
            icons::warn(),
            style(urls.len() - failed).bold(),
            urls.len()
        );
        anyhow::bail!("{} URL(s) failed", failed);
    }

    eprintln!(
        "{} Retrieved {} entries",
        icons::success(),
        style(entries.len()).bold()
    );
    Ok(())
}
