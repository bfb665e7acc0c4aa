//! Markdown product summaries
//!
//! One short markdown document per product, rendered next to its JSON
//! record in the output directory.

use crate::product::ResolvedProduct;

/// Formats a product as markdown
///
/// The percentage line is only present for discounted products; a missing
/// price renders as `n/a`.
pub fn format_product_markdown(product: &ResolvedProduct) -> String {
    let mut md = String::new();

    md.push_str("# Ebucks Dealz\n");
    md.push_str(&format!("## {}\n", product.name));
    md.push_str(&format!("[Product Page]({})\n\n", product.url));

    match product.price {
        Some(price) => md.push_str(&format!("Price: R{:.2}\n\n", price)),
        None => md.push_str("Price: n/a\n\n"),
    }
    md.push_str(&format!("Savings: R{:.2}\n", product.savings));
    if product.is_discounted() {
        md.push_str(&format!("\nPercentage off: {}%\n", product.percentage));
    }

    md
}
