//! Хранилище синтезированных чанков
//!
//! Один WAV-файл на отпечаток: `<root>/<hex>.wav`. Запись идет во временный
//! файл рядом с итоговым и публикуется переименованием, поэтому читатель видит
//! запись либо целиком, либо не видит вовсе.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::audio::wav::{validate_wav, wav_duration};
use crate::cache::fingerprint::Fingerprint;
use crate::error::{Result, TtsError};

const ENTRY_EXTENSION: &str = "wav";
const TEMP_PREFIX: &str = ".tmp";

/// Запись кэша
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    /// WAV-байты чанка
    pub bytes: Vec<u8>,
    pub duration: Duration,
    pub byte_len: u64,
    pub created_at: DateTime<Utc>,
}

/// Кэш чанков в каталоге файловой системы
#[derive(Debug, Clone)]
pub struct ChunkCache {
    root: PathBuf,
}

impl ChunkCache {
    /// Открыть кэш, создав каталог при необходимости
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            TtsError::CacheIo(format!("Failed to create cache dir {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Путь к файлу записи
    pub fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root
            .join(format!("{}.{}", fingerprint.to_hex(), ENTRY_EXTENSION))
    }

    pub fn has(&self, fingerprint: &Fingerprint) -> bool {
        self.path_for(fingerprint).is_file()
    }

    /// Прочитать запись
    ///
    /// Поврежденная запись удаляется и считается промахом.
    pub fn get(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        let path = self.path_for(fingerprint);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TtsError::CacheIo(format!(
                    "Failed to read cache entry {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if let Err(e) = validate_wav(&bytes) {
            log::warn!("Dropping corrupt cache entry {}: {}", fingerprint, e);
            self.remove(fingerprint)?;
            return Ok(None);
        }

        let created_at = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(entry(*fingerprint, bytes, created_at)))
    }

    /// Записать чанк атомарно; существующая запись перезаписывается
    pub fn put(&self, fingerprint: &Fingerprint, bytes: &[u8]) -> Result<CacheEntry> {
        let target = self.path_for(fingerprint);
        let io_err = |action: &str, e: std::io::Error| {
            TtsError::CacheIo(format!("Failed to {} {}: {}", action, target.display(), e))
        };

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".part")
            .tempfile_in(&self.root)
            .map_err(|e| io_err("create temp file for", e))?;
        temp.write_all(bytes).map_err(|e| io_err("write", e))?;
        temp.as_file().sync_all().map_err(|e| io_err("sync", e))?;
        publish(temp, &target)?;

        log::debug!("Cached chunk {} ({} bytes)", fingerprint, bytes.len());
        Ok(entry(*fingerprint, bytes.to_vec(), Utc::now()))
    }

    /// Удалить запись; отсутствие записи не ошибка
    pub fn remove(&self, fingerprint: &Fingerprint) -> Result<()> {
        let path = self.path_for(fingerprint);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TtsError::CacheIo(format!(
                "Failed to remove cache entry {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn entry(fingerprint: Fingerprint, bytes: Vec<u8>, created_at: DateTime<Utc>) -> CacheEntry {
    let duration = wav_duration(&bytes).unwrap_or(Duration::ZERO);
    CacheEntry {
        fingerprint,
        byte_len: bytes.len() as u64,
        duration,
        bytes,
        created_at,
    }
}

fn publish(temp: NamedTempFile, target: &Path) -> Result<()> {
    temp.persist(target).map_err(|e| {
        TtsError::CacheIo(format!("Failed to publish {}: {}", target.display(), e.error))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PcmBuffer;
    use crate::cache::fingerprint::fingerprint;
    use tempfile::tempdir;

    fn sample_wav() -> Vec<u8> {
        PcmBuffer::silence(8000, 1, Duration::from_millis(500))
            .to_wav_bytes()
            .unwrap()
    }

    #[test]
    fn test_put_then_get() {
        let dir = tempdir().unwrap();
        let cache = ChunkCache::open(dir.path().join("cache")).unwrap();
        let fp = fingerprint("안녕하세요", "m", 1.0, 8000).unwrap();

        assert!(!cache.has(&fp));
        assert!(cache.get(&fp).unwrap().is_none());

        let bytes = sample_wav();
        let stored = cache.put(&fp, &bytes).unwrap();
        assert_eq!(stored.byte_len, bytes.len() as u64);
        assert_eq!(stored.duration, Duration::from_millis(500));

        assert!(cache.has(&fp));
        let entry = cache.get(&fp).unwrap().unwrap();
        assert_eq!(entry.bytes, bytes);
        assert_eq!(entry.fingerprint, fp);
        assert_eq!(
            cache.path_for(&fp).file_name().unwrap().to_string_lossy(),
            format!("{}.wav", fp.to_hex())
        );
    }

    #[test]
    fn test_put_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let cache = ChunkCache::open(dir.path()).unwrap();
        let fp = fingerprint("가", "m", 1.0, 8000).unwrap();
        cache.put(&fp, &sample_wav()).unwrap();
        cache.put(&fp, &sample_wav()).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![format!("{}.wav", fp.to_hex())]);
    }

    #[test]
    fn test_corrupt_entry_is_removed_and_missed() {
        let dir = tempdir().unwrap();
        let cache = ChunkCache::open(dir.path()).unwrap();
        let fp = fingerprint("가", "m", 1.0, 8000).unwrap();
        fs::write(cache.path_for(&fp), b"RIFF-broken").unwrap();

        assert!(cache.get(&fp).unwrap().is_none());
        assert!(!cache.has(&fp));
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        let cache = ChunkCache::open(dir.path()).unwrap();
        let fp = fingerprint("가", "m", 1.0, 8000).unwrap();
        cache.remove(&fp).unwrap();
    }
}
