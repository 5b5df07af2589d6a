use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::{error::Result, model::Entity};

const META: TableDefinition<&str, &str> = TableDefinition::new("meta");
const ENTITIES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("entities");

const FINGERPRINT_KEY: &str = "fingerprint";

/// Persists the entities of a loaded knowledge base.
///
/// Entities are stored as JSON keyed by load position, so reading them
/// back restores KB order. The stored fingerprint identifies the sources
/// the entities came from; a mismatch means the cache is stale.
pub struct KbCache {
    db: Database,
}

impl KbCache {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;

        let txn = db.begin_write()?;
        txn.open_table(META)?;
        txn.open_table(ENTITIES)?;
        txn.commit()?;

        Ok(Self { db })
    }

    pub fn fingerprint(&self) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(META)?;
        Ok(table.get(FINGERPRINT_KEY)?.map(|v| v.value().to_string()))
    }

    /// Entities stored under `fingerprint`, or `None` if the cache is
    /// empty or was written for different sources.
    pub fn load(&self, fingerprint: &str) -> Result<Option<Vec<Entity>>> {
        if self.fingerprint()?.as_deref() != Some(fingerprint) {
            return Ok(None);
        }
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ENTITIES)?;
        let mut entities = Vec::new();
        for entry in table.iter()? {
            let (_pos, bytes) = entry?;
            entities.push(serde_json::from_slice(bytes.value())?);
        }
        debug!(entities = entities.len(), "read knowledge base from cache");
        Ok(Some(entities))
    }

    /// Replace the cache contents in a single transaction.
    pub fn store(&self, fingerprint: &str, entities: &[Entity]) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ENTITIES)?;
            table.retain(|_, _| false)?;
            for (pos, entity) in entities.iter().enumerate() {
                let bytes = serde_json::to_vec(entity)?;
                table.insert(pos as u64, bytes.as_slice())?;
            }
            let mut meta = txn.open_table(META)?;
            meta.insert(FINGERPRINT_KEY, fingerprint)?;
        }
        txn.commit()?;
        debug!(entities = entities.len(), "wrote knowledge base cache");
        Ok(())
    }

    /// Drop the stored entities and fingerprint.
    pub fn clear(&self) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ENTITIES)?;
            table.retain(|_, _| false)?;
            let mut meta = txn.open_table(META)?;
            meta.remove(FINGERPRINT_KEY)?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl std::fmt::Debug for KbCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KbCache").finish_non_exhaustive()
    }
}
