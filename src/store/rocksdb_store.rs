use crate::Result;
use rocksdb::{DBCompactionStyle, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;

/// Byte-level RocksDB store. Values are encoded by [`super::StateStoreBackend`].
pub struct RocksDBStore {
    db: DB,
}

impl RocksDBStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_open_files(1024);
        opts.set_use_fsync(false);
        opts.set_bytes_per_sync(8 * 1024 * 1024);
        // Prefix scans over `order#`/`showtime#` dominate reads; keep level compaction.
        opts.set_compaction_style(DBCompactionStyle::Level);
        opts.set_write_buffer_size(64 * 1024 * 1024);

        Ok(Self {
            db: DB::open(&opts, path)?,
        })
    }

    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    pub fn put_bytes(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.db.put(key, value)?;
        Ok(())
    }

    /// Values whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<Vec<u8>>> {
        let mut values = Vec::new();
        let mode = IteratorMode::From(prefix.as_bytes(), Direction::Forward);
        for item in self.db.iterator(mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            values.push(value.into_vec());
        }
        Ok(values)
    }

    /// Writes all entries in one atomic `WriteBatch`.
    pub fn write_all(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        let mut batch = WriteBatch::default();
        for (key, value) in entries {
            batch.put(key, value);
        }
        self.db.write(batch)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Drop for RocksDBStore {
    fn drop(&mut self) {
        let _ = self.db.flush();
    }
}
