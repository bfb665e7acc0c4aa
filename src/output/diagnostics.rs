//! Append-only diagnostic logs
//!
//! Three plain-text files, one line per entry:
//! - `links.txt`: `<queued link> <page it was found on>`
//! - `urls.txt`: canonical URLs as they are fetched
//! - `scraped.txt`: URLs of products delivered to the handler

use crate::output::traits::OutputResult;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

pub const LINKS_FILE: &str = "links.txt";
pub const URLS_FILE: &str = "urls.txt";
pub const SCRAPED_FILE: &str = "scraped.txt";

#[derive(Debug)]
pub struct DiagnosticLog {
    links: Mutex<File>,
    urls: Mutex<File>,
    scraped: Mutex<File>,
}

impl DiagnosticLog {
    /// Opens (or creates) the three log files in `dir`
    pub fn open(dir: &Path) -> OutputResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            links: Mutex::new(open_append(&dir.join(LINKS_FILE))?),
            urls: Mutex::new(open_append(&dir.join(URLS_FILE))?),
            scraped: Mutex::new(open_append(&dir.join(SCRAPED_FILE))?),
        })
    }

    pub fn record_link(&self, link: &str, source: &str) -> OutputResult<()> {
        append_line(&self.links, &format!("{} {}", link, source))
    }

    pub fn record_url(&self, url: &str) -> OutputResult<()> {
        append_line(&self.urls, url)
    }

    pub fn record_scraped(&self, url: &str) -> OutputResult<()> {
        append_line(&self.scraped, url)
    }
}

fn open_append(path: &Path) -> OutputResult<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

fn append_line(file: &Mutex<File>, line: &str) -> OutputResult<()> {
    let mut file = file.lock().unwrap();
    writeln!(file, "{}", line)?;
    Ok(())
}
