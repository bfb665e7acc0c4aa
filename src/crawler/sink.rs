//! Result sink: hands finished products to the caller
//!
//! The sink guarantees the handler runs at most once per (category id,
//! product id) and never concurrently with itself.

use crate::output::OutputError;
use crate::product::{CorrelationKey, ResolvedProduct};
use crate::DealzError;
use std::collections::HashSet;
use std::sync::Mutex;

/// Receives every resolved product exactly once
///
/// Implemented for closures, so a crawl can be driven with
/// `|product: &ResolvedProduct| { ...; Ok(()) }`.
pub trait ProductHandler: Send {
    fn handle(&mut self, product: &ResolvedProduct) -> Result<(), OutputError>;
}

impl<F> ProductHandler for F
where
    F: FnMut(&ResolvedProduct) -> Result<(), OutputError> + Send,
{
    fn handle(&mut self, product: &ResolvedProduct) -> Result<(), OutputError> {
        self(product)
    }
}

struct SinkInner {
    handler: Box<dyn ProductHandler>,
    emitted: HashSet<CorrelationKey>,
}

pub struct ResultSink {
    inner: Mutex<SinkInner>,
}

impl ResultSink {
    pub fn new(handler: Box<dyn ProductHandler>) -> Self {
        Self {
            inner: Mutex::new(SinkInner {
                handler,
                emitted: HashSet::new(),
            }),
        }
    }

    /// Delivers a product to the handler
    ///
    /// Returns `Ok(false)` without calling the handler if a product with the
    /// same key was already delivered. A handler failure is returned as
    /// [`DealzError::Output`].
    pub fn emit(&self, product: ResolvedProduct) -> Result<bool, DealzError> {
        let mut inner = self.inner.lock().unwrap();

        let key = product.key();
        if inner.emitted.contains(&key) {
            tracing::debug!("Product {} already emitted, dropping duplicate", key);
            return Ok(false);
        }

        inner.handler.handle(&product)?;
        inner.emitted.insert(key);
        Ok(true)
    }

    /// Number of distinct products delivered
    pub fn emitted_count(&self) -> usize {
        self.inner.lock().unwrap().emitted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn product(cat: &str, prod: &str) -> ResolvedProduct {
        ResolvedProduct {
            url: format!(
                "https://shop.test/web/shop/productSelected.do?prodId={}&catId={}",
                prod, cat
            ),
            name: format!("Product {}", prod),
            cat_id: cat.to_string(),
            prod_id: prod.to_string(),
            price: Some(10.0),
            savings: 0.0,
            percentage: 0.0,
        }
    }

    #[test]
    fn test_handler_runs_once_per_key() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            ResultSink::new(Box::new(move |p: &ResolvedProduct| -> Result<(), OutputError> {
                seen.lock().unwrap().push(p.prod_id.clone());
                Ok(())
            }))
        };

        assert!(sink.emit(product("1", "1")).unwrap());
        assert!(sink.emit(product("1", "2")).unwrap());
        assert!(!sink.emit(product("1", "1")).unwrap());
        // Same product id in another category is a different product
        assert!(sink.emit(product("2", "1")).unwrap());

        assert_eq!(*seen.lock().unwrap(), vec!["1", "2", "1"]);
        assert_eq!(sink.emitted_count(), 3);
    }

    #[test]
    fn test_handler_failure_is_error() {
        let sink = ResultSink::new(Box::new(
            |_: &ResolvedProduct| -> Result<(), OutputError> {
                Err(OutputError::Write("disk full".to_string()))
            },
        ));

        let result = sink.emit(product("1", "1"));
        assert!(matches!(result, Err(DealzError::Output(_))));
        assert_eq!(sink.emitted_count(), 0);
    }

    #[test]
    fn test_stateful_handler() {
        struct Counter(usize);
        impl ProductHandler for Counter {
            fn handle(&mut self, _: &ResolvedProduct) -> Result<(), OutputError> {
                self.0 += 1;
                Ok(())
            }
        }

        let sink = ResultSink::new(Box::new(Counter(0)));
        sink.emit(product("1", "1")).unwrap();
        sink.emit(product("1", "2")).unwrap();
        assert_eq!(sink.emitted_count(), 2);
    }
}
