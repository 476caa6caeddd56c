//! Модуль для работы с входным текстом
//!
//! Нормализация, разбиение на чанки и маскирование персональных данных.

pub mod chunker;
pub mod mask;
pub mod normalize;

pub use chunker::{chunk_text, Chunk};
pub use normalize::{decode_input, normalize_text, read_source};
