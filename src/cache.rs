//! Read-through pick-list cache
//!
//! Presentation layers show `(id, label)` lists of active teams and
//! tournaments when asking for a reference. The lists are loaded on first
//! read and kept until `invalidate` is called; the cache never refreshes
//! itself, so callers invalidate after every mutation.

use std::cell::RefCell;
use crate::entity::Entity;
use crate::query::FilterSet;
use crate::repository::Repository;
use crate::Result;

/// One selectable entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickItem {
    pub id: i64,
    pub label: String,
}

impl std::fmt::Display for PickItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.label)
    }
}

#[derive(Default)]
struct Lists {
    teams: Option<Vec<PickItem>>,
    tournaments: Option<Vec<PickItem>>,
}

pub struct PickListCache<'a> {
    repo: Repository<'a>,
    lists: RefCell<Lists>,
}

impl<'a> PickListCache<'a> {
    pub fn new(repo: Repository<'a>) -> Self {
        Self {
            repo,
            lists: RefCell::new(Lists::default()),
        }
    }

    pub fn teams(&self) -> Result<Vec<PickItem>> {
        self.read_through(Entity::Team, |lists| &mut lists.teams)
    }

    pub fn tournaments(&self) -> Result<Vec<PickItem>> {
        self.read_through(Entity::Tournament, |lists| &mut lists.tournaments)
    }

    /// Label of a cached entry, loading the list if needed
    pub fn label(&self, entity: Entity, id: i64) -> Result<Option<String>> {
        let items = match entity {
            Entity::Team => self.teams()?,
            Entity::Tournament => self.tournaments()?,
            _ => return Ok(None),
        };
        Ok(items.into_iter().find(|item| item.id == id).map(|item| item.label))
    }

    /// Drop every cached list
    pub fn invalidate(&self) {
        *self.lists.borrow_mut() = Lists::default();
        tracing::debug!("Pick-list cache invalidated");
    }

    pub fn is_loaded(&self, entity: Entity) -> bool {
        let lists = self.lists.borrow();
        match entity {
            Entity::Team => lists.teams.is_some(),
            Entity::Tournament => lists.tournaments.is_some(),
            _ => false,
        }
    }

    fn read_through(
        &self,
        entity: Entity,
        slot: fn(&mut Lists) -> &mut Option<Vec<PickItem>>,
    ) -> Result<Vec<PickItem>> {
        if let Some(items) = slot(&mut self.lists.borrow_mut()) {
            return Ok(items.clone());
        }

        let spec = entity.spec();
        let items: Vec<PickItem> = self
            .repo
            .get_all(entity, &FilterSet::new())?
            .into_iter()
            .filter_map(|row| {
                Some(PickItem {
                    id: row.get_i64(spec.primary_key)?,
                    label: row.get(spec.label_column)?.to_string(),
                })
            })
            .collect();

        *slot(&mut self.lists.borrow_mut()) = Some(items.clone());
        Ok(items)
    }
}
