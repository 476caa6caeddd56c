//! Маскирование персональных данных в строках для логов

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap();
    // Телефоны, номера карт и регистрационные номера: цифры с разделителями
    static ref NUMBER_RUN_RE: Regex = Regex::new(r"\d[\d\-. ]{4,}\d").unwrap();
}

pub const EMAIL_MASK: &str = "***@***";

/// Заменить каждую цифру на `token`
pub fn mask_digits(text: &str, token: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_digit() {
                token.to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}

/// Заменить адреса электронной почты на `***@***`
pub fn mask_emails(text: &str) -> String {
    EMAIL_RE.replace_all(text, EMAIL_MASK).into_owned()
}

/// Замаскировать длинные последовательности цифр (от шести символов)
pub fn mask_number_runs(text: &str) -> String {
    NUMBER_RUN_RE
        .replace_all(text, |caps: &regex::Captures| mask_digits(&caps[0], "*"))
        .into_owned()
}

/// Очистка фрагмента пользовательского текста: почта и все цифры
pub fn scrub(text: &str) -> String {
    mask_digits(&mask_emails(text), "*")
}

/// Очистка готовой строки лога
///
/// Счетчики и размеры в сообщении остаются читаемыми, маскируются адреса
/// почты и длинные номера. Фрагменты входного текста должны попадать в
/// сообщение уже через `scrub` или `preview`.
pub fn scrub_record(line: &str) -> String {
    mask_number_runs(&mask_emails(line))
}

/// Короткое безопасное превью текста для логов
pub fn preview(text: &str, max_chars: usize) -> String {
    let masked = scrub(text);
    let mut out: String = masked.chars().take(max_chars).collect();
    if masked.chars().count() > max_chars {
        out.push('…');
    }
    out
}
