//! Вспомогательные функции

pub mod process;
pub mod temp;
