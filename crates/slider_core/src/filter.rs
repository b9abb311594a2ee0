//! Normalização de leituras cruas e filtro de ruído.

use crate::protocol::MAX_RAW_READING;
use serde::{Deserialize, Serialize};

/// Nível de redução de ruído.
///
/// Aceita os níveis nomeados (`"low"`, `"default"`, `"high"`) ou um
/// limiar numérico direto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoiseReduction {
    Named(NoiseLevel),
    Custom(f32),
}

impl Default for NoiseReduction {
    fn default() -> Self {
        NoiseReduction::Named(NoiseLevel::Default)
    }
}

/// Níveis nomeados de redução de ruído.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseLevel {
    Low,
    Default,
    High,
}

impl NoiseReduction {
    /// Diferença mínima (exclusiva) para reportar um movimento.
    pub fn threshold(self) -> f32 {
        match self {
            NoiseReduction::Named(NoiseLevel::Low) => 0.015,
            NoiseReduction::Named(NoiseLevel::High) => 0.035,
            NoiseReduction::Named(NoiseLevel::Default) => 0.025,
            NoiseReduction::Custom(value) => value.max(0.0),
        }
    }
}

/// Configuração do filtro aplicada a cada linha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub invert: bool,
    pub threshold: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            invert: false,
            threshold: NoiseReduction::default().threshold(),
        }
    }
}

/// Reduz para 2 casas decimais (truncando) dentro de 0.0–1.0.
pub fn normalize_scalar(value: f32) -> f32 {
    ((value * 100.0).floor() / 100.0).clamp(0.0, 1.0)
}

/// Converte uma leitura crua em percentual normalizado.
pub fn raw_to_percent(raw: u32, invert: bool) -> f32 {
    let dirty = raw as f32 / MAX_RAW_READING as f32;
    let normalized = normalize_scalar(dirty);
    if invert { 1.0 - normalized } else { normalized }
}

/// `true` se a diferença excede o limiar de ruído.
pub fn significantly_different(old: f32, new: f32, threshold: f32) -> bool {
    (old - new).abs() > threshold
}
