//! Разбиение текста на чанки для синтеза
//!
//! Чанки покрывают весь текст без потерь и дублирования: срезы идут подряд,
//! а текст каждого чанка отличается от своего среза только пробелами по краям.
//! Длина измеряется в графемах (расширенных кластерах Unicode), поэтому
//! граница никогда не режет слог из чамо, флаг или эмодзи с ZWJ.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Result, TtsError};

lazy_static! {
    static ref FENCE_RE: Regex = Regex::new(r"(?m)^[ \t]*```").unwrap();
}

const SENTENCE_TERMINALS: [char; 7] = ['.', '!', '?', '…', '。', '！', '？'];
const CLOSING_MARKS: [char; 8] = ['"', '\'', '”', '’', ')', ']', '」', '』'];

/// Единица синтеза
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Порядковый номер, задает порядок склейки аудио
    pub index: usize,
    /// Текст чанка без пробелов по краям
    pub text: String,
    /// Длина текста в байтах
    pub byte_len: usize,
    /// Диапазон байтов исходного текста, из которого получен чанк
    pub span: Range<usize>,
}

impl Chunk {
    /// Длина текста в графемах
    pub fn grapheme_len(&self) -> usize {
        self.text.graphemes(true).count()
    }
}

/// Разбить текст на чанки длиной не более `max_chars` графем
///
/// Граница ищется в окне `max(max_chars / 4, 1)` графем перед пределом:
/// сначала после знака конца предложения (или пустой строки), затем после
/// пробела, иначе текст режется ровно по пределу. Границы внутри блоков кода
/// Markdown используются, только если вне блока подходящей границы нет.
pub fn chunk_text(text: &str, max_chars: usize) -> Result<Vec<Chunk>> {
    if max_chars == 0 {
        return Err(TtsError::InvalidInput(
            "max_chars must be positive".to_string(),
        ));
    }

    let fences = code_fence_ranges(text);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let rest = &text[start..];
        let end = if rest.grapheme_indices(true).nth(max_chars).is_none() {
            text.len()
        } else {
            let in_fence =
                |pos: usize| fences.iter().any(|r| r.start < start + pos && start + pos < r.end);
            start + find_break(rest, max_chars, in_fence)
        };
        push_chunk(&mut chunks, text, start..end);
        start = end;
    }

    log::debug!("Split {} graphemes into {} chunks", text.graphemes(true).count(), chunks.len());
    Ok(chunks)
}

/// Найти границу первого чанка в `rest`, который длиннее `max_chars`
fn find_break<F>(rest: &str, max_chars: usize, in_fence: F) -> usize
where
    F: Fn(usize) -> bool,
{
    // Графема с индексом max_chars существует: она нужна, чтобы заглянуть за предел
    let graphemes: Vec<(usize, &str)> = rest.grapheme_indices(true).take(max_chars + 1).collect();
    let lookback = (max_chars / 4).max(1);

    // [предложение вне кода, пробел вне кода, предложение в коде, пробел в коде]
    let mut best: [Option<usize>; 4] = [None; 4];

    for i in (max_chars - lookback)..max_chars {
        let (pos, g) = graphemes[i];

        let sentence_end = if starts_with_any(g, &SENTENCE_TERMINALS) {
            let mut j = i + 1;
            while j < max_chars && starts_with_any(graphemes[j].1, &CLOSING_MARKS) {
                j += 1;
            }
            is_blank(graphemes[j].1).then_some(j)
        } else if g == "\n" && i > 0 && graphemes[i - 1].1 == "\n" {
            Some(i + 1)
        } else {
            None
        };

        if let Some(mut j) = sentence_end {
            while j < max_chars && is_blank(graphemes[j].1) {
                j += 1;
            }
            let at = graphemes[j].0;
            best[if in_fence(at) { 2 } else { 0 }] = Some(at);
        } else if is_blank(g) {
            let at = pos + g.len();
            best[if in_fence(at) { 3 } else { 1 }] = Some(at);
        }
    }

    // Иначе режем ровно по пределу, на границе графем
    best.iter()
        .flatten()
        .next()
        .copied()
        .unwrap_or(graphemes[max_chars].0)
}

fn starts_with_any(grapheme: &str, marks: &[char]) -> bool {
    grapheme.chars().next().map_or(false, |c| marks.contains(&c))
}

fn is_blank(grapheme: &str) -> bool {
    grapheme.chars().all(char::is_whitespace)
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str, span: Range<usize>) {
    let trimmed = text[span.clone()].trim();
    if trimmed.is_empty() {
        return;
    }
    chunks.push(Chunk {
        index: chunks.len(),
        text: trimmed.to_string(),
        byte_len: trimmed.len(),
        span,
    });
}

/// Байтовые диапазоны блоков кода Markdown (незакрытый блок идет до конца)
fn code_fence_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<usize> = None;

    for m in FENCE_RE.find_iter(text) {
        match open.take() {
            None => open = Some(m.start()),
            Some(start) => {
                let end = text[m.end()..]
                    .find('\n')
                    .map(|p| m.end() + p)
                    .unwrap_or(text.len());
                ranges.push(start..end);
            }
        }
    }
    if let Some(start) = open {
        ranges.push(start..text.len());
    }
    ranges
}
