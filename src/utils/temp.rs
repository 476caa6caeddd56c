//! Модуль для работы с временными и незавершенными файлами
//!
//! Итоговые файлы пишутся во временный файл в том же каталоге и публикуются
//! переименованием. `PendingFiles` удаляет уже опубликованные файлы задачи,
//! если она не дошла до `commit`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, TtsError};

/// Записать файл атомарно через временный файл в целевом каталоге
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let output_err = |e: std::io::Error| {
        TtsError::Output(format!("Failed to write {}: {}", path.display(), e))
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".tmp")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(output_err)?;
    temp.write_all(bytes).map_err(output_err)?;
    temp.as_file().sync_all().map_err(output_err)?;
    temp.persist(path).map_err(|e| output_err(e.error))?;
    Ok(())
}

/// Список файлов, которые нужно удалить, если задача не завершится
#[derive(Debug, Default)]
pub struct PendingFiles {
    files: Vec<PathBuf>,
    committed: bool,
}

impl PendingFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Записать файл атомарно и запомнить его
    pub fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        write_atomic(path, bytes)?;
        self.files.push(path.to_path_buf());
        Ok(())
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Оставить файлы на диске
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Удалить записанные файлы
    pub fn cleanup(&mut self) {
        for file in self.files.drain(..) {
            match fs::remove_file(&file) {
                Ok(()) => log::debug!("Removed partial output {}", file.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove partial output {}: {}", file.display(), e),
            }
        }
    }
}

impl Drop for PendingFiles {
    fn drop(&mut self) {
        if !self.committed {
            self.cleanup();
        }
    }
}
