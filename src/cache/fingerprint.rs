//! Ключи кэша чанков
//!
//! Отпечаток зависит только от текста чанка и параметров, влияющих на звук:
//! идентификатора модели, скорости и частоты дискретизации.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::config::SynthJobConfig;
use crate::error::{Result, TtsError};

/// Отпечаток чанка фиксированной длины (md5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Текстовое представление: 32 шестнадцатеричных символа
    pub fn to_hex(&self) -> String {
        format!("{:x}", md5::Digest(self.0))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TtsError::InvalidInput(format!("not a fingerprint: {:?}", s)));
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|e| TtsError::InvalidInput(e.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

/// Привести текст к канонической форме: края обрезаны, пробелы схлопнуты
pub fn canonical_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Вычислить отпечаток чанка
pub fn fingerprint(chunk_text: &str, model_id: &str, speed: f32, sample_rate: u32) -> Result<Fingerprint> {
    if !speed.is_finite() || speed <= 0.0 {
        return Err(TtsError::InvalidInput(format!(
            "speed must be a finite positive number, got {}",
            speed
        )));
    }

    let text = canonical_text(chunk_text);
    let mut hasher = md5::Context::new();
    // Каждое поле с тегом и длиной, чтобы разные наборы не давали один поток байтов
    feed(&mut hasher, b"text", text.as_bytes());
    feed(&mut hasher, b"model", model_id.as_bytes());
    feed(&mut hasher, b"speed", &speed.to_bits().to_le_bytes());
    feed(&mut hasher, b"rate", &sample_rate.to_le_bytes());

    Ok(Fingerprint(hasher.compute().0))
}

fn feed(hasher: &mut md5::Context, tag: &[u8], value: &[u8]) {
    hasher.consume(tag);
    hasher.consume((value.len() as u64).to_le_bytes());
    hasher.consume(value);
}

/// Поля конфигурации, влияющие на итоговый файл
#[derive(Serialize)]
struct ConfigDigestFields<'a> {
    model_id: &'a str,
    output_format: &'a str,
    speed: f32,
    sample_rate: u32,
    silence_ms: u32,
    max_chunk_chars: usize,
    failure_policy: crate::config::FailurePolicy,
}

/// Дайджест конфигурации задачи для метаданных результата
///
/// Модель учитывается по идентификатору синтезатора, а не по пути из
/// конфигурации.
pub fn config_digest(config: &SynthJobConfig, model_id: &str) -> Result<String> {
    let fields = ConfigDigestFields {
        model_id,
        output_format: config.output_format.extension(),
        speed: config.speed,
        sample_rate: config.sample_rate,
        silence_ms: config.silence_ms,
        max_chunk_chars: config.max_chunk_chars,
        failure_policy: config.failure_policy,
    };
    let canonical = serde_json::to_vec(&fields)?;
    Ok(format!("{:x}", md5::compute(canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn test_deterministic() {
        let a = fingerprint("안녕하세요", "/models/kss", 1.0, 22_050).unwrap();
        let b = fingerprint("안녕하세요", "/models/kss", 1.0, 22_050).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 32);
    }

    #[test]
    fn test_each_field_changes_fingerprint() {
        let base = fingerprint("안녕하세요", "/models/kss", 1.0, 22_050).unwrap();
        assert_ne!(base, fingerprint("안녕히 가세요", "/models/kss", 1.0, 22_050).unwrap());
        assert_ne!(base, fingerprint("안녕하세요", "/models/other", 1.0, 22_050).unwrap());
        assert_ne!(base, fingerprint("안녕하세요", "/models/kss", 1.1, 22_050).unwrap());
        assert_ne!(base, fingerprint("안녕하세요", "/models/kss", 1.0, 16_000).unwrap());
    }

    #[test]
    fn test_cosmetic_whitespace_ignored() {
        let a = fingerprint("  안녕   하세요\n", "m", 1.0, 22_050).unwrap();
        let b = fingerprint("안녕 하세요", "m", 1.0, 22_050).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let a = fingerprint("ab", "c", 1.0, 22_050).unwrap();
        let b = fingerprint("a", "bc", 1.0, 22_050).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rejects_non_finite_speed() {
        assert!(fingerprint("가", "m", f32::NAN, 22_050).is_err());
        assert!(fingerprint("가", "m", f32::INFINITY, 22_050).is_err());
        assert!(fingerprint("가", "m", 0.0, 22_050).is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let fp = fingerprint("가", "m", 1.0, 22_050).unwrap();
        assert_eq!(fp.to_hex().parse::<Fingerprint>().unwrap(), fp);
        assert!("zz".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_config_digest_ignores_job_identity() {
        let settings = Settings::default();
        let a = SynthJobConfig::builder(&settings).text("가").build().unwrap();
        let b = SynthJobConfig::builder(&settings).text("나").build().unwrap();
        assert_eq!(config_digest(&a, "kss").unwrap(), config_digest(&b, "kss").unwrap());

        let c = SynthJobConfig::builder(&settings).text("가").speed(1.5).build().unwrap();
        assert_ne!(config_digest(&a, "kss").unwrap(), config_digest(&c, "kss").unwrap());
    }

    #[test]
    fn test_config_digest_tracks_model() {
        let settings = Settings::default();
        let config = SynthJobConfig::builder(&settings).text("가").build().unwrap();
        assert_ne!(
            config_digest(&config, "/models/kss").unwrap(),
            config_digest(&config, "/models/other").unwrap()
        );
    }
}
