use redb::backends::InMemoryBackend;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use super::{Record, RecordStore, StoreError, StoreResult};
use crate::models::{Course, Order, OrderItem, User};
use crate::setup::db_setup;

/// Keyed-map backend: a redb database living entirely in memory. Each entity
/// table maps the record id to its JSON document.
pub struct MemoryStore {
    db: Database,
}

fn table_for<R: Record>() -> TableDefinition<'static, &'static str, &'static str> {
    TableDefinition::new(R::TABLE)
}

/// Rejects `record` if its id or any unique key is already held by another
/// record in the same table.
fn check_unique<R: Record>(txn: &WriteTransaction, record: &R, is_new: bool) -> StoreResult<()> {
    let table = txn.open_table(table_for::<R>())?;
    if is_new && table.get(record.id())?.is_some() {
        return Err(StoreError::ConstraintViolation { field: "id".to_string() });
    }

    let keys = record.unique_keys();
    if keys.is_empty() {
        return Ok(());
    }
    for entry in table.iter()? {
        let (id, doc) = entry?;
        if id.value() == record.id() {
            continue;
        }
        let other: R = serde_json::from_str(doc.value())?;
        for (name, value) in other.unique_keys() {
            if keys.iter().any(|(key, v)| *key == name && *v == value) {
                return Err(StoreError::ConstraintViolation { field: name.to_string() });
            }
        }
    }
    Ok(())
}

fn write_doc<R: Record>(txn: &WriteTransaction, record: &R) -> StoreResult<()> {
    let doc = serde_json::to_string(record)?;
    let mut table = txn.open_table(table_for::<R>())?;
    table.insert(record.id(), doc.as_str())?;
    Ok(())
}

fn read_doc<R: Record>(txn: &WriteTransaction, id: &str) -> StoreResult<Option<R>> {
    let table = txn.open_table(table_for::<R>())?;
    let doc = match table.get(id)? {
        Some(guard) => Some(serde_json::from_str(guard.value())?),
        None => None,
    };
    Ok(doc)
}

impl MemoryStore {
    pub fn new() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(InMemoryBackend::new())?;
        db_setup::setup_keyed_tables(&db)
            .map_err(|e| StoreError::Invalid(format!("table setup failed: {}", e)))?;
        Ok(Self { db })
    }
}

impl RecordStore for MemoryStore {
    fn insert<R: Record>(&self, record: &R) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        check_unique(&write_txn, record, true)?;
        write_doc(&write_txn, record)?;
        write_txn.commit()?;
        Ok(())
    }

    fn get<R: Record>(&self, id: &str) -> StoreResult<Option<R>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for::<R>())?;
        let doc = match table.get(id)? {
            Some(guard) => Some(serde_json::from_str(guard.value())?),
            None => None,
        };
        Ok(doc)
    }

    fn find_unique<R: Record>(&self, key: &str, value: &str) -> StoreResult<Option<R>> {
        let found = self.scan::<R>()?.into_iter().find(|record| {
            record
                .unique_keys()
                .iter()
                .any(|(name, v)| *name == key && v == value)
        });
        Ok(found)
    }

    fn update<R: Record, F: FnOnce(&mut R)>(&self, id: &str, change: F) -> StoreResult<Option<R>> {
        let write_txn = self.db.begin_write()?;
        let mut record: R = match read_doc(&write_txn, id)? {
            Some(record) => record,
            None => return Ok(None),
        };

        change(&mut record);
        if record.id() != id {
            return Err(StoreError::Invalid("updates must not change the record id".to_string()));
        }

        check_unique(&write_txn, &record, false)?;
        write_doc(&write_txn, &record)?;
        write_txn.commit()?;
        Ok(Some(record))
    }

    fn delete<R: Record>(&self, id: &str) -> StoreResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(table_for::<R>())?;
            let removed = table.remove(id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    fn scan<R: Record>(&self) -> StoreResult<Vec<R>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_for::<R>())?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_id, doc) = entry?;
            records.push(serde_json::from_str(doc.value())?);
        }
        Ok(records)
    }

    fn insert_order(&self, order: &Order, items: &[OrderItem]) -> StoreResult<()> {
        if items.is_empty() {
            return Err(StoreError::Invalid("an order needs at least one item".to_string()));
        }

        // Nothing becomes visible unless the transaction commits; returning
        // early aborts it.
        let write_txn = self.db.begin_write()?;
        if read_doc::<User>(&write_txn, &order.user_id)?.is_none() {
            return Err(StoreError::MissingReference(format!("user {}", order.user_id)));
        }
        check_unique(&write_txn, order, true)?;
        write_doc(&write_txn, order)?;

        for item in items {
            if item.order_id != order.id {
                return Err(StoreError::Invalid(format!(
                    "item {} belongs to order {}",
                    item.id, item.order_id
                )));
            }
            if read_doc::<Course>(&write_txn, &item.course_id)?.is_none() {
                return Err(StoreError::MissingReference(format!("course {}", item.course_id)));
            }
            check_unique(&write_txn, item, true)?;
            write_doc(&write_txn, item)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
