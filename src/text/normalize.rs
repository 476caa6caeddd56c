//! Чтение и нормализация входного текста
//!
//! Некорректная кодировка отклоняется здесь, до разбиения на чанки.

use std::fs;

use crate::config::TextSource;
use crate::error::{Result, TtsError};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Декодировать байты входного файла в строку
pub fn decode_input(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes).map_err(|e| {
        TtsError::InvalidInput(format!(
            "input is not valid UTF-8 (invalid byte at offset {})",
            e.valid_up_to()
        ))
    })?;
    ensure_no_nul(text)?;
    Ok(text.to_string())
}

fn ensure_no_nul(text: &str) -> Result<()> {
    if let Some(pos) = text.find('\0') {
        return Err(TtsError::InvalidInput(format!(
            "input contains a NUL character at byte {}",
            pos
        )));
    }
    Ok(())
}

/// Нормализовать переводы строк и пробельные символы
///
/// CRLF и одиночный CR превращаются в LF, табуляции и неразрывные пробелы в
/// обычный пробел, хвостовые пробелы в строках удаляются.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .split('\n')
        .map(|line| {
            line.chars()
                .map(|c| match c {
                    '\t' | '\u{00A0}' | '\u{3000}' => ' ',
                    other => other,
                })
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Получить нормализованный текст задачи
pub fn read_source(source: &TextSource) -> Result<String> {
    let raw = match source {
        TextSource::Inline(text) => {
            ensure_no_nul(text)?;
            text.clone()
        }
        TextSource::File(path) => {
            let bytes = fs::read(path).map_err(|e| {
                TtsError::InvalidInput(format!("cannot read input {}: {}", path.display(), e))
            })?;
            let text = decode_input(&bytes)?;
            log::debug!("Loaded input text: {} bytes from {}", bytes.len(), path.display());
            text
        }
    };
    Ok(normalize_text(&raw))
}
