//! Shared helper functions for CLI commands.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Context;

/// Collect URLs from arguments followed by an optional list file (`-` for stdin).
///
/// Blank lines and lines starting with `#` are skipped.
pub fn collect_urls(args: &[String], input: Option<&Path>) -> anyhow::Result<Vec<String>> {
    let mut urls: Vec<String> = args
        .iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    if let Some(path) = input {
        let lines = if path == Path::new("-") {
            read_lines(std::io::stdin().lock())?
        } else {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            read_lines(std::io::BufReader::new(file))?
        };
        urls.extend(lines);
    }

    Ok(urls)
}

fn read_lines(reader: impl BufRead) -> anyhow::Result<Vec<String>> {
    let mut urls = Vec::new();
    for line in reader.lines() {
        let line = line.context("Failed to read URL list")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        urls.push(line.to_string());
    }
    Ok(urls)
}

/// Write entries separated by blank lines to `output`, or stdout.
pub fn write_entries(entries: &[&str], output: Option<&Path>) -> anyhow::Result<()> {
    let mut text = entries.join("\n\n");
    if !text.is_empty() {
        text.push('\n');
    }

    match output {
        Some(path) => std::fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_urls_from_args_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("urls.txt");
        std::fs::write(&list, "# papers\nhttps://b.org/2\n\n  https://c.org/3  \n").unwrap();

        let urls = collect_urls(&["https://a.org/1".to_string()], Some(&list)).unwrap();
        assert_eq!(urls, vec!["https://a.org/1", "https://b.org/2", "https://c.org/3"]);
    }

    #[test]
    fn test_missing_list_file_is_an_error() {
        assert!(collect_urls(&[], Some(Path::new("/nonexistent/urls.txt"))).is_err());
    }

    #[test]
    fn test_write_entries_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("refs.bib");
        write_entries(&["@article{a}", "@book{b}"], Some(&out)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&out).unwrap(),
            "@article{a}\n\n@book{b}\n"
        );
    }
}
