//! Product directory writer
//!
//! Lays products out on disk the way the page generator expects:
//!
//! ```text
//! <run dir>/
//!   25%/
//!     Smart-Watch-1173295004.md
//!     raw/Smart-Watch-1173295004.json
//!   other/
//!     Kettle-496816900.md
//!     raw/Kettle-496816900.json
//! ```

use crate::crawler::ProductHandler;
use crate::output::json::write_product;
use crate::output::markdown::format_product_markdown;
use crate::output::traits::{OutputError, OutputResult};
use crate::product::ResolvedProduct;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Bucket for products without a discount
pub const UNDISCOUNTED_BUCKET: &str = "other";

/// Creates the directory a crawl writes into
///
/// Without `overwrite`, a new subdirectory of `data_dir` named after the
/// current local time is created. With `overwrite`, `data_dir` itself is
/// wiped and reused.
pub fn prepare_output_dir(data_dir: &Path, overwrite: bool) -> OutputResult<PathBuf> {
    let dir = if overwrite {
        match fs::remove_dir_all(data_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        data_dir.to_path_buf()
    } else {
        let stamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%SZ%z");
        data_dir.join(stamp.to_string())
    };

    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Name of the directory a product is filed under
pub fn bucket_name(product: &ResolvedProduct) -> String {
    if product.is_discounted() {
        format!("{:.0}%", product.percentage)
    } else {
        UNDISCOUNTED_BUCKET.to_string()
    }
}

/// Replaces every run of characters outside `[a-zA-Z0-9-]` with `-`
pub fn sanitize_filename(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars =
        UNSAFE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9-]+").expect("valid filename pattern"));
    unsafe_chars.replace_all(name, "-").into_owned()
}

/// File stem for a product: sanitized name plus product id
///
/// The id keeps products with equal names from overwriting each other.
pub fn file_stem(product: &ResolvedProduct) -> String {
    let name = sanitize_filename(product.name.trim());
    let name = name.trim_matches('-');
    let id = sanitize_filename(&product.prod_id);

    if name.is_empty() {
        format!("product-{}", id)
    } else {
        format!("{}-{}", name, id)
    }
}

/// Writes each product as markdown plus a raw JSON record
#[derive(Debug)]
pub struct DirectoryWriter {
    root: PathBuf,
    written: usize,
}

impl DirectoryWriter {
    /// Writes into an existing directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: 0,
        }
    }

    /// Prepares the run directory under `data_dir` and writes into it
    pub fn create(data_dir: &Path, overwrite: bool) -> OutputResult<Self> {
        Ok(Self::new(prepare_output_dir(data_dir, overwrite)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of products written so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Writes one product; returns the path of its JSON record
    pub fn write(&mut self, product: &ResolvedProduct) -> OutputResult<PathBuf> {
        let bucket = self.root.join(bucket_name(product));
        let raw = bucket.join("raw");
        fs::create_dir_all(&raw)?;

        let stem = file_stem(product);
        fs::write(
            bucket.join(format!("{}.md", stem)),
            format_product_markdown(product),
        )?;

        let json_path = raw.join(format!("{}.json", stem));
        write_product(product, &json_path)?;

        self.written += 1;
        Ok(json_path)
    }
}

impl ProductHandler for DirectoryWriter {
    fn handle(&mut self, product: &ResolvedProduct) -> Result<(), OutputError> {
        self.write(product).map(|_| ())
    }
}
