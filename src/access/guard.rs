//! The resource guard: identifier parsing, lookup and ordered predicates.

use tracing::{debug, error};

use crate::error::{AccessError, StorageError};
use crate::model::{Owned, Principal, Resource};
use crate::storage::EntityLookup;

// =============================================================================
// Predicates
// =============================================================================

/// An authorization check over the acting principal and a resolved entity.
///
/// Predicates must be pure: the guard may stop calling them at any point, so
/// they cannot be relied on for side effects.
pub trait Predicate<E>: Send + Sync {
    fn authorize(&self, principal: Option<&Principal>, entity: &E) -> bool;
}

impl<E, F> Predicate<E> for F
where
    F: Fn(Option<&Principal>, &E) -> bool + Send + Sync,
{
    fn authorize(&self, principal: Option<&Principal>, entity: &E) -> bool {
        self(principal, entity)
    }
}

/// Passes only when the principal owns the entity.
///
/// Anonymous requests never pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserMustOwn;

impl<E: Owned> Predicate<E> for UserMustOwn {
    fn authorize(&self, principal: Option<&Principal>, entity: &E) -> bool {
        principal.is_some_and(|principal| principal.id == entity.owner())
    }
}

// =============================================================================
// Resource Guard
// =============================================================================

/// Parse a path segment as a positive integer identifier.
pub fn parse_id(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|id| *id > 0)
}

/// Resolves an identifier to an entity and checks predicates in order.
///
/// Predicates are evaluated in the order they were added with
/// [`ResourceGuard::require`]. The first one returning `false` ends the check
/// with [`AccessError::Forbidden`]; the remaining ones are not called.
pub struct ResourceGuard<'a, E> {
    predicates: Vec<Box<dyn Predicate<E> + 'a>>,
}

impl<'a, E> Default for ResourceGuard<'a, E> {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }
}

impl<'a, E> ResourceGuard<'a, E>
where
    E: Resource + Send,
{
    /// A guard with no predicates: any existing entity is returned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate.
    pub fn require(mut self, predicate: impl Predicate<E> + 'a) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Number of predicates that will be checked.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Resolve `raw_id` through `lookup` and authorize `principal` against it.
    ///
    /// # Errors
    ///
    /// - [`AccessError::InvalidId`] when `raw_id` is not a positive integer
    ///   (no lookup happens)
    /// - [`AccessError::NotFound`] when the lookup reports absence
    /// - [`AccessError::Internal`] for any other lookup failure
    /// - [`AccessError::Forbidden`] when a predicate fails
    pub async fn by_id<L>(
        &self,
        lookup: &L,
        raw_id: &str,
        principal: Option<&Principal>,
    ) -> Result<E, AccessError>
    where
        L: EntityLookup<E> + ?Sized,
    {
        let id = parse_id(raw_id).ok_or_else(|| {
            debug!(resource = E::NAME, raw_id = %raw_id, "Rejected malformed identifier");
            AccessError::InvalidId {
                resource: E::NAME,
                raw: raw_id.to_string(),
            }
        })?;

        let entity = match lookup.by_id(id).await {
            Ok(entity) => entity,
            Err(StorageError::NotFound(_)) => {
                debug!(resource = E::NAME, id, "Resource not found");
                return Err(AccessError::NotFound {
                    resource: E::NAME,
                    id,
                });
            }
            Err(source) => {
                error!(resource = E::NAME, id, "Resource lookup failed: {}", source);
                return Err(AccessError::Internal {
                    resource: E::NAME,
                    id,
                    source,
                });
            }
        };

        for (index, predicate) in self.predicates.iter().enumerate() {
            if !predicate.authorize(principal, &entity) {
                debug!(
                    resource = E::NAME,
                    id,
                    predicate = index,
                    principal = ?principal.map(|p| p.id),
                    "Access denied"
                );
                return Err(AccessError::Forbidden {
                    resource: E::NAME,
                    id,
                    predicate: index,
                });
            }
        }

        Ok(entity)
    }
}
