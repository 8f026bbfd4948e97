use std::sync::Arc;

use store::Store;
use types::ids::Symbol;

/// Shared handler state: the store handle and the symbol registry loaded at
/// startup. The core takes both as parameters; there are no hidden
/// singletons behind this struct.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Vec<Symbol>>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, registry: Vec<Symbol>) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
        }
    }

    /// Look up a registered symbol by its tag, ignoring case.
    pub fn lookup_symbol(&self, tag: &str) -> Option<&Symbol> {
        self.registry
            .iter()
            .find(|symbol| symbol.as_str().eq_ignore_ascii_case(tag))
    }
}
