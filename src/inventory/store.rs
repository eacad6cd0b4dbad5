use super::validate::{check_ip, check_name};
use super::InventoryError;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stores (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS items (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    name     TEXT NOT NULL,
    ip       TEXT NOT NULL,
    store_id INTEGER NOT NULL REFERENCES stores(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_items_store ON items(store_id);
";

/// A named store and its items, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Store {
    #[serde(skip_serializing)]
    pub id: i64,
    pub name: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    #[serde(skip_serializing)]
    pub id: i64,
    pub name: String,
    pub ip: String,
    #[serde(skip_serializing)]
    pub store_id: i64,
}

/// SQLite-backed inventory.
///
/// Every mutation runs in a `BEGIN IMMEDIATE` transaction, so the
/// check-then-write sequences (duplicate name, missing store) cannot
/// interleave with another writer.
pub struct InventoryStore {
    pool: Pool<SqliteConnectionManager>,
}

impl InventoryStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path, pool_size: u32, busy_timeout_ms: u64) -> Result<Self, InventoryError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let busy_timeout = Duration::from_millis(busy_timeout_ms);
        let manager = SqliteConnectionManager::file(path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;

        let conn = pool.get()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);

        tracing::info!(path = %path.display(), pool_size, "Inventory database opened");
        Ok(Self { pool })
    }

    /// Private in-memory database. One connection, so every caller sees the same data.
    pub fn open_in_memory() -> Result<Self, InventoryError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| configure_connection(conn, Duration::from_millis(5_000)));
        let pool = Pool::builder().max_size(1).build(manager)?;
        pool.get()?.execute_batch(SCHEMA)?;
        Ok(Self { pool })
    }

    /// Every store with its items, read from one consistent snapshot.
    pub fn list_stores(&self) -> Result<Vec<Store>, InventoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let mut stores: Vec<Store> = {
            let mut stmt = tx.prepare("SELECT id, name FROM stores ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(Store {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    items: Vec::new(),
                })
            })?;
            rows.collect::<Result<_, _>>()?
        };

        let items: Vec<Item> = {
            let mut stmt =
                tx.prepare("SELECT id, name, ip, store_id FROM items ORDER BY store_id, id")?;
            let rows = stmt.query_map([], item_from_row)?;
            rows.collect::<Result<_, _>>()?
        };
        tx.commit()?;

        // Both sides are ordered by store id, so one forward pass groups them.
        let mut cursor = 0;
        for item in items {
            while cursor < stores.len() && stores[cursor].id < item.store_id {
                cursor += 1;
            }
            if let Some(store) = stores.get_mut(cursor).filter(|s| s.id == item.store_id) {
                store.items.push(item);
            }
        }
        Ok(stores)
    }

    pub fn get_store(&self, name: &str) -> Result<Option<Store>, InventoryError> {
        let conn = self.pool.get()?;
        let Some(id) = find_store_id(&conn, name)? else {
            return Ok(None);
        };
        Ok(Some(load_store(&conn, id)?))
    }

    pub fn item_count_for(&self, store_id: i64) -> Result<u64, InventoryError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE store_id = ?1",
            params![store_id],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Create an empty store. Fails with `Conflict` if the name is taken.
    pub fn create_store(&self, name: &str) -> Result<Store, InventoryError> {
        check_name("name", name)?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if find_store_id(&tx, name)?.is_some() {
            return Err(InventoryError::store_exists(name));
        }
        tx.execute("INSERT INTO stores (name) VALUES (?1)", params![name])
            .map_err(|e| unique_to_conflict(e, || InventoryError::store_exists(name)))?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(store = name, id, "Store created");
        Ok(Store {
            id,
            name: name.to_string(),
            items: Vec::new(),
        })
    }

    /// Append an item to an existing store.
    pub fn create_item(
        &self,
        store_name: &str,
        item_name: &str,
        ip: &str,
    ) -> Result<Item, InventoryError> {
        check_name("name", item_name)?;
        check_ip(ip)?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let store_id = find_store_id(&tx, store_name)?
            .ok_or_else(|| InventoryError::StoreNotFound(store_name.to_string()))?;
        tx.execute(
            "INSERT INTO items (name, ip, store_id) VALUES (?1, ?2, ?3)",
            params![item_name, ip, store_id],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::info!(store = store_name, item = item_name, ip, "Item created");
        Ok(Item {
            id,
            name: item_name.to_string(),
            ip: ip.to_string(),
            store_id,
        })
    }

    /// Rename a store, keeping its id and items. Renaming to its own name is a no-op.
    pub fn rename_store(&self, old_name: &str, new_name: &str) -> Result<Store, InventoryError> {
        check_name("new name", new_name)?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = find_store_id(&tx, old_name)?
            .ok_or_else(|| InventoryError::StoreNotFound(old_name.to_string()))?;
        if let Some(other) = find_store_id(&tx, new_name)? {
            if other != id {
                return Err(InventoryError::rename_taken(new_name));
            }
        }
        tx.execute(
            "UPDATE stores SET name = ?1 WHERE id = ?2",
            params![new_name, id],
        )
        .map_err(|e| unique_to_conflict(e, || InventoryError::rename_taken(new_name)))?;
        let store = load_store(&tx, id)?;
        tx.commit()?;

        tracing::info!(from = old_name, to = new_name, id, "Store renamed");
        Ok(store)
    }

    /// Delete a store; its items go with it.
    pub fn delete_store(&self, name: &str) -> Result<(), InventoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = find_store_id(&tx, name)?
            .ok_or_else(|| InventoryError::StoreNotFound(name.to_string()))?;
        tx.execute("DELETE FROM stores WHERE id = ?1", params![id])?;
        tx.commit()?;

        tracing::info!(store = name, id, "Store deleted");
        Ok(())
    }
}

fn configure_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

fn find_store_id(conn: &Connection, name: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM stores WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
}

fn load_store(conn: &Connection, id: i64) -> rusqlite::Result<Store> {
    let name: String = conn.query_row(
        "SELECT name FROM stores WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    let mut stmt =
        conn.prepare("SELECT id, name, ip, store_id FROM items WHERE store_id = ?1 ORDER BY id")?;
    let items = stmt
        .query_map(params![id], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Store { id, name, items })
}

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        ip: row.get(2)?,
        store_id: row.get(3)?,
    })
}

fn unique_to_conflict(
    err: rusqlite::Error,
    conflict: impl FnOnce() -> InventoryError,
) -> InventoryError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            conflict()
        }
        other => InventoryError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, InventoryStore) {
        let tmp = TempDir::new().unwrap();
        let store = InventoryStore::open(&tmp.path().join("inventory.db"), 4, 5_000).unwrap();
        (tmp, store)
    }

    #[test]
    fn empty_inventory_lists_nothing() {
        let (_tmp, store) = temp_store();
        assert!(store.list_stores().unwrap().is_empty());
    }

    #[test]
    fn create_then_list_preserves_order() {
        let (_tmp, store) = temp_store();
        store.create_store("Switches").unwrap();
        store.create_store("Routers").unwrap();
        store.create_item("Switches", "A", "10.0.0.1").unwrap();
        store.create_item("Routers", "R1", "10.0.1.1").unwrap();
        store.create_item("Switches", "B", "10.0.0.2").unwrap();

        let stores = store.list_stores().unwrap();
        let names: Vec<_> = stores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Switches", "Routers"]);
        let items: Vec<_> = stores[0].items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(items, ["A", "B"]);
        assert_eq!(stores[1].items.len(), 1);
    }

    #[test]
    fn duplicate_store_is_conflict() {
        let (_tmp, store) = temp_store();
        store.create_store("A").unwrap();
        let err = store.create_store("A").unwrap_err();
        assert!(matches!(err, InventoryError::Conflict { .. }));
        assert_eq!(err.to_string(), "store exists");
        // Case-sensitive
        store.create_store("a").unwrap();
        assert_eq!(store.list_stores().unwrap().len(), 2);
    }

    #[test]
    fn empty_names_are_invalid() {
        let (_tmp, store) = temp_store();
        assert!(matches!(
            store.create_store(""),
            Err(InventoryError::InvalidArgument(_))
        ));
        store.create_store("S").unwrap();
        assert!(matches!(
            store.create_item("S", "", "1.1.1.1"),
            Err(InventoryError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.create_item("S", "X", "1.1.1"),
            Err(InventoryError::InvalidArgument(_))
        ));
    }

    #[test]
    fn item_on_missing_store_is_not_found() {
        let (_tmp, store) = temp_store();
        assert!(matches!(
            store.create_item("Nope", "X", "1.2.3.4"),
            Err(InventoryError::StoreNotFound(_))
        ));
    }

    #[test]
    fn rename_keeps_identity_and_items() {
        let (_tmp, store) = temp_store();
        let created = store.create_store("A").unwrap();
        store.create_item("A", "X", "1.2.3.4").unwrap();

        let renamed = store.rename_store("A", "B").unwrap();
        assert_eq!(renamed.id, created.id);
        assert_eq!(renamed.name, "B");
        assert_eq!(renamed.items.len(), 1);
        assert!(store.get_store("A").unwrap().is_none());
        assert_eq!(store.item_count_for(created.id).unwrap(), 1);
    }

    #[test]
    fn rename_to_taken_name_is_conflict() {
        let (_tmp, store) = temp_store();
        store.create_store("A").unwrap();
        store.create_store("B").unwrap();
        let err = store.rename_store("A", "B").unwrap_err();
        assert_eq!(err.to_string(), "a store with the new name already exists");
        assert!(store.get_store("A").unwrap().is_some());
    }

    #[test]
    fn rename_to_same_name_is_noop() {
        let (_tmp, store) = temp_store();
        store.create_store("A").unwrap();
        let same = store.rename_store("A", "A").unwrap();
        assert_eq!(same.name, "A");
    }

    #[test]
    fn rename_missing_store_is_not_found() {
        let (_tmp, store) = temp_store();
        assert!(matches!(
            store.rename_store("A", "B"),
            Err(InventoryError::StoreNotFound(_))
        ));
    }

    #[test]
    fn delete_cascades_to_items() {
        let (_tmp, store) = temp_store();
        let created = store.create_store("A").unwrap();
        store.create_item("A", "X", "1.2.3.4").unwrap();
        store.create_item("A", "Y", "1.2.3.5").unwrap();

        store.delete_store("A").unwrap();
        assert!(store.get_store("A").unwrap().is_none());
        assert_eq!(store.item_count_for(created.id).unwrap(), 0);

        // A recreated store starts empty with a new id
        let again = store.create_store("A").unwrap();
        assert_ne!(again.id, created.id);
        assert!(store.get_store("A").unwrap().unwrap().items.is_empty());
    }

    #[test]
    fn delete_missing_store_is_not_found() {
        let (_tmp, store) = temp_store();
        assert!(matches!(
            store.delete_store("A"),
            Err(InventoryError::StoreNotFound(_))
        ));
    }

    #[test]
    fn data_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("inventory.db");
        {
            let store = InventoryStore::open(&path, 2, 5_000).unwrap();
            store.create_store("Persisted").unwrap();
            store.create_item("Persisted", "X", "8.8.8.8").unwrap();
        }
        let store = InventoryStore::open(&path, 2, 5_000).unwrap();
        let loaded = store.get_store("Persisted").unwrap().unwrap();
        assert_eq!(loaded.items[0].ip, "8.8.8.8");
    }

    #[test]
    fn in_memory_store_shares_one_database() {
        let store = InventoryStore::open_in_memory().unwrap();
        store.create_store("M").unwrap();
        store.create_item("M", "X", "1.1.1.1").unwrap();
        assert_eq!(store.list_stores().unwrap()[0].items.len(), 1);
    }

    #[test]
    fn serialized_view_hides_ids() {
        let (_tmp, store) = temp_store();
        store.create_store("A").unwrap();
        store.create_item("A", "X", "1.2.3.4").unwrap();
        let json = serde_json::to_value(store.list_stores().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"name": "A", "items": [{"name": "X", "ip": "1.2.3.4"}]}])
        );
    }
}
