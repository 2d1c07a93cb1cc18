use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use hvcs_compress::{CompressionEngine, EngineConfig};
use hvcs_crypto::ContentHasher;
use hvcs_types::ObjectId;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::blob;
use crate::error::{StoreError, StoreResult};
use crate::stats::{StatsCounter, StoreStats};
use crate::traits::ObjectStore;

/// Object store tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Payloads shorter than this are stored uncompressed.
    pub min_compress_size: usize,
    /// Largest payload `put` accepts.
    pub max_blob_size: u64,
    /// Hex characters of the hash used as the bucket directory name.
    pub bucket_prefix_len: usize,
    pub engine: EngineConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_compress_size: 64,
            max_blob_size: 100 * 1024 * 1024,
            bucket_prefix_len: 2,
            engine: EngineConfig::default(),
        }
    }
}

/// What is already on disk for an ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Existing {
    Missing,
    Intact,
    /// Truncated, or its header does not describe the payload.
    Damaged,
}

/// Filesystem-backed store: `<root>/<hh>/<hash>.blob`.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    config: StoreConfig,
    engine: CompressionEngine,
    stats: StatsCounter,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, config: StoreConfig) -> StoreResult<Self> {
        if config.bucket_prefix_len == 0 || config.bucket_prefix_len > ObjectId::HEX_LEN {
            return Err(StoreError::InvalidConfig(format!(
                "bucket prefix length must be 1..={}, got {}",
                ObjectId::HEX_LEN,
                config.bucket_prefix_len
            )));
        }
        let root = root.into();
        fs::create_dir_all(&root)?;
        let engine = CompressionEngine::new(config.engine.clone())?;
        debug!(root = %root.display(), "opened object store");
        Ok(Self {
            root,
            config,
            engine,
            stats: StatsCounter::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Path of the blob file for `id`.
    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root
            .join(&hex[..self.config.bucket_prefix_len])
            .join(format!("{hex}.blob"))
    }

    fn check_size(&self, len: usize) -> StoreResult<()> {
        if len as u64 > self.config.max_blob_size {
            return Err(StoreError::SizeLimitExceeded {
                size: len as u64,
                limit: self.config.max_blob_size,
            });
        }
        Ok(())
    }

    fn wants_compression(&self, data: &[u8]) -> bool {
        data.len() >= self.config.min_compress_size
    }

    /// Header-only check of the file for `id`. The full hash check stays
    /// in `get`, so a same-length bit flip in the payload reads as intact.
    fn existing(&self, id: &ObjectId, len: usize) -> StoreResult<Existing> {
        let mut file = match File::open(self.object_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Existing::Missing),
            Err(e) => return Err(e.into()),
        };
        let file_len = file.metadata()?.len();
        let mut header = [0u8; blob::HEADER_LEN];
        if file.read_exact(&mut header).is_err() {
            return Ok(Existing::Damaged);
        }
        let intact = match blob::BlobHeader::parse(id, &header) {
            Ok(h) if h.original_len != len as u64 => false,
            Ok(h) if h.is_compressed() => file_len > blob::HEADER_LEN as u64,
            Ok(_) => file_len == (blob::HEADER_LEN + len) as u64,
            Err(_) => false,
        };
        Ok(if intact { Existing::Intact } else { Existing::Damaged })
    }

    /// Write a framed blob atomically. Losing a race to an identical writer
    /// counts as a dedup hit. `replace` overwrites a damaged file instead.
    fn write_framed(
        &self,
        id: &ObjectId,
        original_len: usize,
        framed: &[u8],
        replace: bool,
    ) -> StoreResult<()> {
        let path = self.object_path(id);
        let bucket = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(bucket)?;

        let mut tmp = NamedTempFile::new_in(bucket)?;
        tmp.write_all(framed)?;
        tmp.as_file().sync_all()?;
        let persisted = if replace {
            tmp.persist(&path).map(drop)
        } else {
            tmp.persist_noclobber(&path).map(drop)
        };
        match persisted {
            Ok(_) => {
                self.stats.record_write(original_len as u64, framed.len() as u64);
                debug!(
                    hash = %id.short_hex(),
                    bytes = original_len,
                    stored = framed.len(),
                    "blob written"
                );
                Ok(())
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                self.stats.record_dedup();
                debug!(hash = %id.short_hex(), "lost write race to identical blob");
                Ok(())
            }
            Err(e) => Err(StoreError::Io(e.error)),
        }
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, data: &[u8]) -> StoreResult<ObjectId> {
        self.check_size(data.len())?;
        let id = ContentHasher::raw_hash(data);
        let replace = match self.existing(&id, data.len())? {
            Existing::Intact => {
                self.stats.record_dedup();
                debug!(hash = %id.short_hex(), "dedup hit");
                return Ok(id);
            }
            Existing::Damaged => {
                warn!(hash = %id.short_hex(), "rewriting damaged blob");
                true
            }
            Existing::Missing => false,
        };

        let compressed = if self.wants_compression(data) {
            blob::pick_smaller(data, self.engine.compress_default(data)?)
        } else {
            None
        };
        self.write_framed(&id, data.len(), &blob::encode(data, compressed), replace)?;
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let bytes = match fs::read(self.object_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(*id));
            }
            Err(e) => return Err(e.into()),
        };
        let data = blob::decode(id, &bytes)?;
        let computed = ContentHasher::raw_hash(&data);
        if computed != *id {
            warn!(hash = %id.short_hex(), computed = %computed.short_hex(), "blob failed integrity check");
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(data)
    }

    fn contains(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).is_file())
    }

    /// Compresses every new payload in one pass over the worker pool, then
    /// writes the files in input order.
    fn put_batch(&self, items: Vec<Vec<u8>>) -> StoreResult<Vec<ObjectId>> {
        for data in &items {
            self.check_size(data.len())?;
        }
        let ids: Vec<ObjectId> = items.iter().map(|d| ContentHasher::raw_hash(d)).collect();

        // First occurrence of each ID not intact on disk.
        let mut pending: Vec<(usize, bool)> = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let first = ids[..i].iter().all(|prev| prev != id);
            let existing = if first {
                self.existing(id, items[i].len())?
            } else {
                Existing::Intact
            };
            match existing {
                Existing::Intact => self.stats.record_dedup(),
                Existing::Missing => pending.push((i, false)),
                Existing::Damaged => {
                    warn!(hash = %id.short_hex(), "rewriting damaged blob");
                    pending.push((i, true));
                }
            }
        }

        let to_compress: Vec<usize> = pending
            .iter()
            .map(|&(i, _)| i)
            .filter(|&i| self.wants_compression(&items[i]))
            .collect();
        let frames = self.engine.compress_batch(
            to_compress.iter().map(|&i| items[i].clone()).collect(),
            self.engine.config().level,
        );
        let mut compressed: Vec<Option<Vec<u8>>> = vec![None; items.len()];
        for (&i, frame) in to_compress.iter().zip(frames) {
            compressed[i] = blob::pick_smaller(&items[i], frame?);
        }

        for &(i, replace) in &pending {
            let framed = blob::encode(&items[i], compressed[i].take());
            self.write_framed(&ids[i], items[i].len(), &framed, replace)?;
        }
        debug!(
            count = items.len(),
            written = pending.len(),
            "batch put"
        );
        Ok(ids)
    }

    fn stats(&self) -> StoreStats {
        self.stats.snapshot()
    }
}
