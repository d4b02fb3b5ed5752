//! # Queries
//!
//! A query caches which archetypes match a `with`/`without` filter. Because
//! archetypes are canonical by type set, matching is per table, not per
//! entity. Tables are never destroyed, so each cached query only has to scan
//! the tables created since its last refresh.
//!
//! Iteration walks the live tables every time it is requested. Entities that
//! gain a component mid-step are invisible until the flush moves them.

use std::collections::HashMap;

use super::archetype::{ArchetypeId, ArchetypeManager, ArchetypeSignature, ArchetypeTable};
use super::component::ComponentTypeId;
use super::storage::ComponentManager;
use super::view::EntityView;

/// Predicate over archetype signatures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct QueryFilter {
    with: ArchetypeSignature,
    without: ArchetypeSignature,
}

impl QueryFilter {
    /// Matches every entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a component type.
    #[must_use]
    pub fn with(mut self, id: ComponentTypeId) -> Self {
        self.with = self.with.with(id);
        self
    }

    /// Excludes a component type.
    #[must_use]
    pub fn without(mut self, id: ComponentTypeId) -> Self {
        self.without = self.without.with(id);
        self
    }

    /// Required types.
    #[must_use]
    pub fn required(&self) -> &ArchetypeSignature {
        &self.with
    }

    /// Excluded types.
    #[must_use]
    pub fn excluded(&self) -> &ArchetypeSignature {
        &self.without
    }

    /// Checks an archetype signature against the filter.
    #[must_use]
    pub fn matches(&self, signature: &ArchetypeSignature) -> bool {
        signature.contains_all(&self.with) && !signature.contains_any(&self.without)
    }
}

/// Handle to a registered query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueryId(usize);

struct CachedQuery {
    filter: QueryFilter,
    matched: Vec<ArchetypeId>,
    /// Number of tables already scanned.
    scanned: usize,
}

impl CachedQuery {
    fn scan(&mut self, tables: &[ArchetypeTable]) {
        for table in tables.iter().skip(self.scanned) {
            if self.filter.matches(table.signature()) {
                self.matched.push(table.id());
            }
        }
        self.scanned = tables.len();
    }
}

/// Cache of matching archetype sets, one per distinct filter.
#[derive(Default)]
pub struct QueryManager {
    queries: Vec<CachedQuery>,
    by_filter: HashMap<QueryFilter, QueryId>,
}

impl QueryManager {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Checks if no query has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Registers a filter, returning the existing id for an identical one.
    pub fn register(&mut self, filter: QueryFilter, archetypes: &ArchetypeManager) -> QueryId {
        if let Some(id) = self.by_filter.get(&filter) {
            return *id;
        }
        let id = QueryId(self.queries.len());
        let mut query = CachedQuery {
            filter: filter.clone(),
            matched: Vec::new(),
            scanned: 0,
        };
        query.scan(archetypes.tables());
        self.queries.push(query);
        self.by_filter.insert(filter, id);
        id
    }

    /// Extends every cached query with tables created since its last scan.
    pub fn refresh(&mut self, archetypes: &ArchetypeManager) {
        let tables = archetypes.tables();
        for query in &mut self.queries {
            if query.scanned < tables.len() {
                query.scan(tables);
            }
        }
    }

    /// Filter behind a query id.
    #[must_use]
    pub fn filter(&self, id: QueryId) -> Option<&QueryFilter> {
        self.queries.get(id.0).map(|q| &q.filter)
    }

    /// Archetypes currently matching a query. Empty for an unknown id.
    #[must_use]
    pub fn matched(&self, id: QueryId) -> &[ArchetypeId] {
        self.queries
            .get(id.0)
            .map(|q| q.matched.as_slice())
            .unwrap_or(&[])
    }
}

/// Lazy iterator over every entity of the matching archetypes.
pub struct QueryIter<'a> {
    archetypes: &'a ArchetypeManager,
    components: &'a ComponentManager,
    matched: std::slice::Iter<'a, ArchetypeId>,
    table: Option<&'a ArchetypeTable>,
    row: usize,
}

impl<'a> QueryIter<'a> {
    pub(crate) fn new(
        archetypes: &'a ArchetypeManager,
        components: &'a ComponentManager,
        matched: &'a [ArchetypeId],
    ) -> Self {
        Self {
            archetypes,
            components,
            matched: matched.iter(),
            table: None,
            row: 0,
        }
    }
}

impl<'a> Iterator for QueryIter<'a> {
    type Item = EntityView<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(table) = self.table {
                if let Some(id) = table.entity_at(self.row) {
                    let view = EntityView::new(id, table, self.row, self.components);
                    self.row += 1;
                    return Some(view);
                }
            }
            let next = self.matched.next()?;
            self.table = self.archetypes.table(*next);
            self.row = 0;
        }
    }
}
