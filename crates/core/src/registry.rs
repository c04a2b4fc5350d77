// Per-type schema memoization.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::error::SchemaError;
use crate::schema::{SheetRecord, SpreadsheetSchema};

static GLOBAL: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::new);

/// Derives each record type's schema at most once.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static SchemaRegistry {
        &GLOBAL
    }

    /// Schema for `R`, derived on first request. Failed derivations are not
    /// cached.
    pub fn schema<R: SheetRecord>(&self) -> Result<Arc<SpreadsheetSchema<R>>, SchemaError> {
        let key = TypeId::of::<R>();
        let mut schemas = self.schemas.lock();
        if let Some(cached) = schemas.get(&key) {
            if let Ok(schema) = Arc::clone(cached).downcast::<SpreadsheetSchema<R>>() {
                return Ok(schema);
            }
        }

        let schema = Arc::new(SpreadsheetSchema::<R>::derive()?);
        log::debug!(
            "derived schema for {} ({} columns, kind {})",
            schema.record_name(),
            schema.bindings().len(),
            schema.kind()
        );
        schemas.insert(key, Arc::clone(&schema) as Arc<dyn Any + Send + Sync>);
        Ok(schema)
    }

    pub fn len(&self) -> usize {
        self.schemas.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
