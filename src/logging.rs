//! Настройка логирования
//!
//! Каждое сообщение перед записью проходит через `mask::scrub_record`, поэтому
//! адреса почты и длинные номера не попадают в лог. Фрагменты входного текста
//! маскируются полностью еще при формировании сообщения.

use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::text::mask;

const CRATE_TARGET: &str = "local_korean_tts";

/// Строка лога в формате `[LEVEL] target: message` с маскированием
pub fn format_line(level: log::Level, target: &str, message: &str) -> String {
    format!("[{}] {}: {}", level, target, mask::scrub_record(message))
}

/// Инициализировать логгер с уровнем для модулей библиотеки
///
/// `RUST_LOG` переопределяет фильтр. Повторная инициализация игнорируется.
pub fn init_logger(level: LevelFilter) {
    let default_filter = format!("warn,{}={},lk_tts={}", CRATE_TARGET, level, level);
    let env = Env::default().filter_or("RUST_LOG", default_filter);

    let mut builder = Builder::from_env(env);

    // Явно подавляем логи от шумных модулей
    builder
        .filter_module("mio", LevelFilter::Error)
        .filter_module("tokio_util", LevelFilter::Error)
        .format(|buf, record| {
            writeln!(
                buf,
                "{}",
                format_line(record.level(), record.target(), &record.args().to_string())
            )
        })
        .target(env_logger::Target::Stderr);

    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
    }
}

/// Разобрать уровень логирования из строки CLI
pub fn parse_level(value: &str) -> Option<LevelFilter> {
    value.trim().parse().ok()
}
