//! Structured product records
//!
//! Each product is stored as one pretty-printed JSON file. The page generator
//! reads them back with [`load_products_from_dir`].

use crate::output::traits::OutputResult;
use crate::product::ResolvedProduct;
use std::fs;
use std::path::Path;

/// Encodes a product as pretty-printed JSON
pub fn encode_product(product: &ResolvedProduct) -> OutputResult<String> {
    Ok(serde_json::to_string_pretty(product)?)
}

/// Decodes a product from JSON
pub fn decode_product(json: &str) -> OutputResult<ResolvedProduct> {
    Ok(serde_json::from_str(json)?)
}

/// Writes a product's JSON record to `path`
pub fn write_product(product: &ResolvedProduct, path: &Path) -> OutputResult<()> {
    let json = encode_product(product)?;
    fs::write(path, json)?;
    Ok(())
}

/// Loads every product record under `dir`
///
/// The directory tree is walked recursively and every `*.json` file is
/// decoded. Records come back sorted by (category id, product id).
pub fn load_products_from_dir(dir: &Path) -> OutputResult<Vec<ResolvedProduct>> {
    let mut products = Vec::new();
    collect_products(dir, &mut products)?;
    products.sort_by(|a, b| (&a.cat_id, &a.prod_id).cmp(&(&b.cat_id, &b.prod_id)));
    Ok(products)
}

fn collect_products(dir: &Path, products: &mut Vec<ResolvedProduct>) -> OutputResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_products(&path, products)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            let json = fs::read_to_string(&path)?;
            products.push(decode_product(&json)?);
        }
    }
    Ok(())
}
