//! Protocolo de linha do dispositivo.
//!
//! Cada mensagem é texto ASCII no formato:
//!
//! ```text
//! f0|f1|...|fn\r\n
//! ```
//!
//! - Cada `fi` é uma leitura crua do ADC (0–1023)
//! - A quantidade de campos pode variar de uma linha para outra
//! - Linhas fora da gramática são descartadas em silêncio

use regex::Regex;
use std::sync::LazyLock;

/// Separador de campos.
pub const FIELD_DELIMITER: char = '|';

/// Terminador de linha esperado.
pub const LINE_TERMINATOR: &str = "\r\n";

/// Maior leitura válida do ADC de 10 bits.
pub const MAX_RAW_READING: u32 = 1023;

static LINE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{1,4}(\|[0-9]{1,4})*\r\n$").expect("padrão de linha inválido")
});

/// Erros de parsing de linha.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineError {
    #[error("Linha fora do formato esperado")]
    Malformed,

    #[error("Primeiro campo fora da faixa: {0} (máximo {MAX_RAW_READING})")]
    FirstFieldOutOfRange(u32),
}

/// `true` se o payload casa com a gramática `d{1,4}(|d{1,4})*\r\n`.
pub fn is_valid_line(payload: &str) -> bool {
    LINE_PATTERN.is_match(payload)
}

/// Valida e separa uma linha em leituras cruas.
///
/// Um campo que não converte vira `0`. Só o primeiro campo passa pela
/// checagem de faixa: o dispositivo às vezes emite a primeira linha
/// concatenada durante o boot (ex: `4558|925|41`).
pub fn parse_line(payload: &str) -> Result<Vec<u32>, LineError> {
    if !is_valid_line(payload) {
        return Err(LineError::Malformed);
    }

    let line = payload.strip_suffix(LINE_TERMINATOR).unwrap_or(payload);
    let fields: Vec<u32> = line
        .split(FIELD_DELIMITER)
        .map(|field| field.parse().unwrap_or(0))
        .collect();

    match fields.first() {
        Some(&first) if first > MAX_RAW_READING => Err(LineError::FirstFieldOutOfRange(first)),
        _ => Ok(fields),
    }
}

/// Monta uma linha no formato do protocolo (usado pelo emulador).
pub fn format_line(readings: &[u32]) -> String {
    let mut line = readings
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join("|");
    line.push_str(LINE_TERMINATOR);
    line
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_line() {
        assert_eq!(parse_line("512|1023|0\r\n"), Ok(vec![512, 1023, 0]));
        assert_eq!(parse_line("7\r\n"), Ok(vec![7]));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_line("garbage\r\n"), Err(LineError::Malformed));
        assert_eq!(parse_line("12|ab|3\r\n"), Err(LineError::Malformed));
        assert_eq!(parse_line("\r\n"), Err(LineError::Malformed));
    }

    #[test]
    fn rejects_missing_terminator_or_wrong_delimiter() {
        assert_eq!(parse_line("1|2|3"), Err(LineError::Malformed));
        assert_eq!(parse_line("1|2|3\n"), Err(LineError::Malformed));
        assert_eq!(parse_line("1,2,3\r\n"), Err(LineError::Malformed));
        assert_eq!(parse_line("1||3\r\n"), Err(LineError::Malformed));
    }

    #[test]
    fn rejects_framing_around_valid_line() {
        assert_eq!(parse_line("xx1|2\r\n"), Err(LineError::Malformed));
        assert_eq!(parse_line("1|2\r\n1|2\r\n"), Err(LineError::Malformed));
    }

    #[test]
    fn rejects_non_ascii_digits() {
        // Dígitos árabe-índicos não são leituras válidas
        assert_eq!(parse_line("١٢|3\r\n"), Err(LineError::Malformed));
    }

    #[test]
    fn first_field_out_of_range_drops_line() {
        assert_eq!(
            parse_line("4558|925|41|643|220\r\n"),
            Err(LineError::FirstFieldOutOfRange(4558))
        );
    }

    #[test]
    fn range_guard_only_applies_to_first_field() {
        assert_eq!(parse_line("10|4558\r\n"), Ok(vec![10, 4558]));
    }

    #[test]
    fn format_matches_grammar() {
        let line = format_line(&[1, 1022, 300]);
        assert_eq!(line, "1|1022|300\r\n");
        assert!(is_valid_line(&line));
    }
}
