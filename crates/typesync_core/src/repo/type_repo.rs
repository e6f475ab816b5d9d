//! Entity/container store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide key/alias lookups and persistence for schema entities.
//! - Provide CRUD for the per-kind folder container tree.
//!
//! # Invariants
//! - Aliases are unique per kind within one container scope.
//! - Listing is deterministic: `alias ASC, key ASC` for entities and
//!   `name ASC, key ASC` for containers.
//! - Containers are only deleted when empty.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::container::EntityContainer;
use crate::model::entity::{ContentType, EntityKey, EntityKind, EntityValidationError};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ENTITY_SELECT_SQL: &str = "SELECT id, kind, body FROM entity_types";
const CONTAINER_SELECT_SQL: &str = "SELECT id, key, kind, name, parent_key FROM entity_containers";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from live store operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Validation(EntityValidationError),
    /// Update targeted an entity that is not persisted.
    NotFound(EntityKey),
    /// Another entity of the same kind already uses the alias in that scope.
    DuplicateAlias { kind: EntityKind, alias: String },
    ContainerNotFound(Uuid),
    /// Container still holds child containers or entities.
    ContainerNotEmpty(Uuid),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "entity not found: {key}"),
            Self::DuplicateAlias { kind, alias } => {
                write!(f, "{kind} alias already in use: {alias}")
            }
            Self::ContainerNotFound(key) => write!(f, "container not found: {key}"),
            Self::ContainerNotEmpty(key) => write!(f, "container is not empty: {key}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<EntityValidationError> for StoreError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Live store capability for schema entities and their containers.
pub trait TypeStore {
    /// Loads one entity by durable key.
    fn find_by_key(&self, kind: EntityKind, key: EntityKey) -> StoreResult<Option<ContentType>>;
    /// Loads every entity of `kind` using `alias`, across containers.
    fn find_by_alias(&self, kind: EntityKind, alias: &str) -> StoreResult<Vec<ContentType>>;
    /// Lists every entity of one kind.
    fn list(&self, kind: EntityKind) -> StoreResult<Vec<ContentType>>;
    /// Inserts or updates one entity; clears its dirty state on success.
    fn save(&self, item: &mut ContentType) -> StoreResult<()>;

    fn container_by_id(&self, id: i64) -> StoreResult<Option<EntityContainer>>;
    fn container_by_key(&self, key: Uuid) -> StoreResult<Option<EntityContainer>>;
    /// Finds a container by name under one parent.
    fn find_container(
        &self,
        kind: EntityKind,
        parent: Option<Uuid>,
        name: &str,
    ) -> StoreResult<Option<EntityContainer>>;
    /// Inserts or updates one container; assigns `id` on insert.
    fn save_container(&self, container: &mut EntityContainer) -> StoreResult<()>;
    /// Deletes one empty container.
    fn delete_container(&self, key: Uuid) -> StoreResult<()>;
    fn list_containers(&self, kind: EntityKind) -> StoreResult<Vec<EntityContainer>>;

    /// Whether `key` was created earlier in the current import run.
    fn created_this_run(&self, _key: EntityKey) -> bool {
        false
    }

    /// Builds a new, unsaved entity.
    fn create(
        &self,
        kind: EntityKind,
        key: EntityKey,
        alias: &str,
    ) -> StoreResult<ContentType> {
        ContentType::new(kind, key, alias).map_err(Into::into)
    }
}

/// SQLite-backed entity store.
pub struct SqliteTypeStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTypeStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TypeStore for SqliteTypeStore<'_> {
    fn find_by_key(&self, kind: EntityKind, key: EntityKey) -> StoreResult<Option<ContentType>> {
        let sql = format!("{ENTITY_SELECT_SQL} WHERE kind = ?1 AND key = ?2");
        self.conn
            .query_row(&sql, params![kind.as_str(), key.to_string()], read_entity_row)
            .optional()?
            .transpose()
    }

    fn find_by_alias(&self, kind: EntityKind, alias: &str) -> StoreResult<Vec<ContentType>> {
        let sql = format!("{ENTITY_SELECT_SQL} WHERE kind = ?1 AND alias = ?2 ORDER BY key ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.as_str(), alias], read_entity_row)?;
        collect_entities(rows)
    }

    fn list(&self, kind: EntityKind) -> StoreResult<Vec<ContentType>> {
        let sql = format!("{ENTITY_SELECT_SQL} WHERE kind = ?1 ORDER BY alias ASC, key ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.as_str()], read_entity_row)?;
        collect_entities(rows)
    }

    fn save(&self, item: &mut ContentType) -> StoreResult<()> {
        item.validate()?;

        let key = item.key.to_string();
        let scope = alias_scope(item);
        let clash = self
            .conn
            .query_row(
                "SELECT key FROM entity_types
                 WHERE kind = ?1 AND alias = ?2 AND key <> ?3 AND container_key IS ?4
                 LIMIT 1",
                params![item.kind.as_str(), item.alias, key, scope],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if clash.is_some() {
            return Err(StoreError::DuplicateAlias {
                kind: item.kind,
                alias: item.alias.clone(),
            });
        }

        let body =
            serde_json::to_string(&*item).map_err(|err| StoreError::InvalidData(err.to_string()))?;
        match item.id {
            None => {
                self.conn.execute(
                    "INSERT INTO entity_types (key, kind, alias, container_key, body)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![key, item.kind.as_str(), item.alias, scope, body],
                )?;
                item.id = Some(self.conn.last_insert_rowid());
            }
            Some(id) => {
                let changed = self.conn.execute(
                    "UPDATE entity_types
                     SET alias = ?2, container_key = ?3, body = ?4
                     WHERE id = ?1",
                    params![id, item.alias, scope, body],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound(item.key));
                }
            }
        }

        debug!(
            "event=entity_save module=repo status=ok kind={} alias={} dirty={}",
            item.kind,
            item.alias,
            item.dirty_properties().join(",")
        );
        item.clear_dirty();
        Ok(())
    }

    fn container_by_id(&self, id: i64) -> StoreResult<Option<EntityContainer>> {
        let sql = format!("{CONTAINER_SELECT_SQL} WHERE id = ?1");
        self.conn
            .query_row(&sql, params![id], read_container_row)
            .optional()?
            .transpose()
    }

    fn container_by_key(&self, key: Uuid) -> StoreResult<Option<EntityContainer>> {
        let sql = format!("{CONTAINER_SELECT_SQL} WHERE key = ?1");
        self.conn
            .query_row(&sql, params![key.to_string()], read_container_row)
            .optional()?
            .transpose()
    }

    fn find_container(
        &self,
        kind: EntityKind,
        parent: Option<Uuid>,
        name: &str,
    ) -> StoreResult<Option<EntityContainer>> {
        let sql = format!(
            "{CONTAINER_SELECT_SQL}
             WHERE kind = ?1 AND parent_key IS ?2 AND name = ?3
             ORDER BY key ASC LIMIT 1"
        );
        self.conn
            .query_row(
                &sql,
                params![kind.as_str(), parent.map(|key| key.to_string()), name],
                read_container_row,
            )
            .optional()?
            .transpose()
    }

    fn save_container(&self, container: &mut EntityContainer) -> StoreResult<()> {
        let parent = container.parent.map(|key| key.to_string());
        match container.id {
            None => {
                self.conn.execute(
                    "INSERT INTO entity_containers (key, kind, name, parent_key)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        container.key.to_string(),
                        container.kind.as_str(),
                        container.name,
                        parent
                    ],
                )?;
                container.id = Some(self.conn.last_insert_rowid());
            }
            Some(id) => {
                let changed = self.conn.execute(
                    "UPDATE entity_containers SET name = ?2, parent_key = ?3 WHERE id = ?1",
                    params![id, container.name, parent],
                )?;
                if changed == 0 {
                    return Err(StoreError::ContainerNotFound(container.key));
                }
            }
        }
        Ok(())
    }

    fn delete_container(&self, key: Uuid) -> StoreResult<()> {
        let key_text = key.to_string();
        let in_use: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entity_containers WHERE parent_key = ?1)
                 OR EXISTS(SELECT 1 FROM entity_types WHERE container_key = ?1)",
            params![key_text],
            |row| row.get(0),
        )?;
        if in_use {
            return Err(StoreError::ContainerNotEmpty(key));
        }

        let changed = self.conn.execute(
            "DELETE FROM entity_containers WHERE key = ?1",
            params![key_text],
        )?;
        if changed == 0 {
            return Err(StoreError::ContainerNotFound(key));
        }
        Ok(())
    }

    fn list_containers(&self, kind: EntityKind) -> StoreResult<Vec<EntityContainer>> {
        let sql = format!("{CONTAINER_SELECT_SQL} WHERE kind = ?1 ORDER BY name ASC, key ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![kind.as_str()], read_container_row)?;

        let mut containers = Vec::new();
        for row in rows {
            containers.push(row??);
        }
        Ok(containers)
    }
}

/// Container key used as the alias uniqueness scope.
fn alias_scope(item: &ContentType) -> Option<String> {
    match &item.parent {
        Some(_) => None,
        None => item.container.map(|key| key.to_string()),
    }
}

fn collect_entities(
    rows: impl Iterator<Item = rusqlite::Result<StoreResult<ContentType>>>,
) -> StoreResult<Vec<ContentType>> {
    let mut items = Vec::new();
    for row in rows {
        items.push(row??);
    }
    Ok(items)
}

fn read_entity_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<ContentType>> {
    let id: i64 = row.get(0)?;
    let kind: String = row.get(1)?;
    let body: String = row.get(2)?;
    Ok(parse_entity(id, &kind, &body))
}

fn parse_entity(id: i64, kind: &str, body: &str) -> StoreResult<ContentType> {
    let kind = EntityKind::parse(kind)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown entity kind `{kind}`")))?;
    let mut item: ContentType = serde_json::from_str(body)
        .map_err(|err| StoreError::InvalidData(format!("entity {id}: {err}")))?;
    if item.kind != kind {
        return Err(StoreError::InvalidData(format!(
            "entity {id} stored as {kind} but body declares {}",
            item.kind
        )));
    }
    item.id = Some(id);
    Ok(item)
}

fn read_container_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<EntityContainer>> {
    let id: i64 = row.get(0)?;
    let key: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let name: String = row.get(3)?;
    let parent: Option<String> = row.get(4)?;
    Ok(parse_container(id, &key, &kind, name, parent.as_deref()))
}

fn parse_container(
    id: i64,
    key: &str,
    kind: &str,
    name: String,
    parent: Option<&str>,
) -> StoreResult<EntityContainer> {
    let parse_key = |value: &str| {
        Uuid::parse_str(value)
            .map_err(|err| StoreError::InvalidData(format!("container {id} key `{value}`: {err}")))
    };
    let kind = EntityKind::parse(kind)
        .ok_or_else(|| StoreError::InvalidData(format!("unknown container kind `{kind}`")))?;

    Ok(EntityContainer {
        id: Some(id),
        key: parse_key(key)?,
        kind,
        name,
        parent: parent.map(parse_key).transpose()?,
    })
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let actual_version = current_user_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(DbError::UninitializedConnection {
            expected_version,
            actual_version,
        }
        .into());
    }
    Ok(())
}
