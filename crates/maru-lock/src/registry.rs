use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

use crate::error::LockError;

/// Lock domains a keyed mutex may be registered under. Combined with a
/// numeric entity id this forms a lock's full identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockDomain {
    User,
    Coupon,
    ProductOption,
    Order,
}

impl LockDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Coupon => "COUPON",
            Self::ProductOption => "PRODUCT_OPTION",
            Self::Order => "ORDER",
        }
    }
}

/// In-process keyed-mutex table: one async mutex per `(domain, id)` pair.
///
/// Domains must be registered when the registry is built; acquiring against
/// an unregistered domain fails fast instead of silently growing a new
/// table. Entries persist for the process lifetime. Build one instance at
/// startup and inject it — there is no global state here.
pub struct LockRegistry {
    tables: HashMap<LockDomain, Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl LockRegistry {
    pub fn new(domains: &[LockDomain]) -> Self {
        let tables = domains
            .iter()
            .map(|domain| (*domain, Mutex::new(HashMap::new())))
            .collect();
        Self { tables }
    }

    /// Return the mutex for `(domain, id)`, creating it on first use.
    ///
    /// Repeated calls with an equal pair return the same instance
    /// (`Arc::ptr_eq` holds); distinct ids get distinct mutexes.
    pub fn acquire(&self, domain: LockDomain, id: i64) -> Result<Arc<AsyncMutex<()>>, LockError> {
        let table = self
            .tables
            .get(&domain)
            .ok_or(LockError::UnknownDomain(domain))?;
        // A poisoned table only means another thread panicked mid-insert;
        // the map itself is still consistent.
        let mut table = match table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mutex = table
            .entry(id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())));
        Ok(Arc::clone(mutex))
    }
}
