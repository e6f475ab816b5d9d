//! Template store contract and SQLite implementation.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::template::Template;
use crate::repo::type_repo::{StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

/// Live store capability for view templates.
pub trait TemplateStore {
    fn template_by_key(&self, key: Uuid) -> StoreResult<Option<Template>>;
    fn template_by_alias(&self, alias: &str) -> StoreResult<Option<Template>>;
    /// Inserts or replaces one template keyed by `key`.
    fn save_template(&self, template: &Template) -> StoreResult<()>;
}

/// SQLite-backed template store.
pub struct SqliteTemplateStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateStore<'conn> {
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        let actual_version = current_user_version(conn)?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(DbError::UninitializedConnection {
                expected_version,
                actual_version,
            }
            .into());
        }
        Ok(Self { conn })
    }
}

impl TemplateStore for SqliteTemplateStore<'_> {
    fn template_by_key(&self, key: Uuid) -> StoreResult<Option<Template>> {
        self.conn
            .query_row(
                "SELECT key, alias, name FROM templates WHERE key = ?1",
                params![key.to_string()],
                read_template_row,
            )
            .optional()?
            .transpose()
    }

    fn template_by_alias(&self, alias: &str) -> StoreResult<Option<Template>> {
        self.conn
            .query_row(
                "SELECT key, alias, name FROM templates WHERE alias = ?1",
                params![alias],
                read_template_row,
            )
            .optional()?
            .transpose()
    }

    fn save_template(&self, template: &Template) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO templates (key, alias, name) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET alias = excluded.alias, name = excluded.name",
            params![template.key.to_string(), template.alias, template.name],
        )?;
        Ok(())
    }
}

fn read_template_row(row: &Row<'_>) -> rusqlite::Result<StoreResult<Template>> {
    let key: String = row.get(0)?;
    let alias: String = row.get(1)?;
    let name: String = row.get(2)?;
    Ok(Uuid::parse_str(&key)
        .map(|key| Template::new(key, alias, name))
        .map_err(|err| StoreError::InvalidData(format!("template key `{key}`: {err}"))))
}

#[cfg(test)]
mod tests {
    use super::{SqliteTemplateStore, TemplateStore};
    use crate::db::open_db_in_memory;
    use crate::model::template::Template;
    use uuid::Uuid;

    #[test]
    fn save_is_upsert_by_key() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteTemplateStore::try_new(&conn).unwrap();
        let key = Uuid::new_v4();

        store.save_template(&Template::new(key, "home", "Home")).unwrap();
        store
            .save_template(&Template::new(key, "homePage", "Home Page"))
            .unwrap();

        assert!(store.template_by_alias("home").unwrap().is_none());
        let loaded = store.template_by_key(key).unwrap().unwrap();
        assert_eq!(loaded.alias, "homePage");
        assert_eq!(
            store.template_by_alias("homePage").unwrap().unwrap().key,
            key
        );
    }
}
