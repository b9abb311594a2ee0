//! Estado dos sliders: contagem atual e último valor reportado de cada um.

use crate::filter::{FilterSettings, raw_to_percent, significantly_different};
use crate::protocol::{LineError, parse_line};
use crate::types::SliderMoveEvent;
use tracing::{debug, info};

/// Valor impossível usado para forçar o próximo evento de cada slider.
pub const UNKNOWN_VALUE: f32 = -1.0;

/// Baseline por slider e detecção de mudança de contagem.
#[derive(Debug, Clone, Default)]
pub struct SliderTracker {
    baseline: Vec<f32>,
    last_known_count: usize,
}

impl SliderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantidade de sliders vista na última linha válida.
    pub fn slider_count(&self) -> usize {
        self.last_known_count
    }

    /// Últimos valores reportados (ou [`UNKNOWN_VALUE`]).
    pub fn baseline(&self) -> &[f32] {
        &self.baseline
    }

    /// Registra a contagem observada. Se mudou, troca o baseline inteiro
    /// por um novo preenchido com [`UNKNOWN_VALUE`] e retorna `true`.
    pub fn observe_count(&mut self, count: usize) -> bool {
        if count == self.last_known_count {
            return false;
        }
        info!("Sliders detectados: {count}");
        self.last_known_count = count;
        self.baseline = vec![UNKNOWN_VALUE; count];
        true
    }

    /// Esquece a contagem: a próxima linha válida é tratada como a primeira.
    pub fn reset_count(&mut self) {
        self.last_known_count = 0;
    }

    /// Avalia todos os campos da linha e devolve os eventos, em ordem.
    ///
    /// `readings` deve ter o tamanho do baseline atual.
    pub fn evaluate(&mut self, readings: &[u32], settings: &FilterSettings) -> Vec<SliderMoveEvent> {
        let mut events = Vec::new();

        for (slider_id, (&raw, current)) in readings.iter().zip(self.baseline.iter_mut()).enumerate() {
            let percent_value = raw_to_percent(raw, settings.invert);
            if significantly_different(*current, percent_value, settings.threshold) {
                *current = percent_value;
                events.push(SliderMoveEvent {
                    slider_id,
                    percent_value,
                });
            }
        }

        events
    }

    /// Pipeline completo de uma linha crua: parse → contagem → filtro.
    ///
    /// Linhas rejeitadas não alteram o estado.
    pub fn process_line(
        &mut self,
        payload: &str,
        settings: &FilterSettings,
    ) -> Result<Vec<SliderMoveEvent>, LineError> {
        let readings = parse_line(payload).inspect_err(|e| {
            if let LineError::FirstFieldOutOfRange(_) = e {
                debug!("Linha malformada ignorada: {:?} ({e})", payload.trim_end());
            }
        })?;

        self.observe_count(readings.len());
        Ok(self.evaluate(&readings, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact() -> FilterSettings {
        FilterSettings {
            invert: false,
            threshold: 0.0,
        }
    }

    #[test]
    fn first_line_reports_every_slider() {
        let mut tracker = SliderTracker::new();
        let events = tracker.process_line("512|1023|0\r\n", &exact()).unwrap();

        assert_eq!(tracker.slider_count(), 3);
        assert_eq!(
            events,
            vec![
                SliderMoveEvent { slider_id: 0, percent_value: 0.5 },
                SliderMoveEvent { slider_id: 1, percent_value: 1.0 },
                SliderMoveEvent { slider_id: 2, percent_value: 0.0 },
            ]
        );
    }

    #[test]
    fn repeated_line_is_silent() {
        let mut tracker = SliderTracker::new();
        tracker.process_line("512|1023|0\r\n", &exact()).unwrap();
        let events = tracker.process_line("512|1023|0\r\n", &exact()).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn count_change_resets_baseline() {
        let mut tracker = SliderTracker::new();
        tracker.process_line("512|1023|0\r\n", &exact()).unwrap();

        let events = tracker.process_line("300|700\r\n", &exact()).unwrap();
        assert_eq!(tracker.slider_count(), 2);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].slider_id, 0);
        assert_eq!(events[1].slider_id, 1);
    }

    #[test]
    fn rejected_lines_leave_state_untouched() {
        let mut tracker = SliderTracker::new();
        tracker.process_line("512|1023|0\r\n", &exact()).unwrap();
        let before = tracker.baseline().to_vec();

        assert_eq!(
            tracker.process_line("4558|925|41|643|220\r\n", &exact()),
            Err(LineError::FirstFieldOutOfRange(4558))
        );
        assert_eq!(tracker.process_line("garbage\r\n", &exact()), Err(LineError::Malformed));

        assert_eq!(tracker.slider_count(), 3);
        assert_eq!(tracker.baseline(), before.as_slice());
    }

    #[test]
    fn reset_count_forces_full_reemission() {
        let mut tracker = SliderTracker::new();
        tracker.process_line("100|200\r\n", &exact()).unwrap();
        tracker.reset_count();

        let events = tracker.process_line("100|200\r\n", &exact()).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn small_moves_are_filtered_and_baseline_kept() {
        let settings = FilterSettings {
            invert: false,
            threshold: 0.025,
        };
        let mut tracker = SliderTracker::new();
        tracker.process_line("512\r\n", &settings).unwrap();

        // 530/1023 → 0.51: abaixo do limiar
        assert!(tracker.process_line("530\r\n", &settings).unwrap().is_empty());
        assert_eq!(tracker.baseline(), &[0.5]);

        // 560/1023 → 0.54: acima
        let events = tracker.process_line("560\r\n", &settings).unwrap();
        assert_eq!(events, vec![SliderMoveEvent { slider_id: 0, percent_value: 0.54 }]);
    }

    #[test]
    fn inversion_applies_before_threshold() {
        let mut tracker = SliderTracker::new();
        tracker.process_line("1023\r\n", &exact()).unwrap();

        let inverted = FilterSettings {
            invert: true,
            threshold: 0.0,
        };
        let events = tracker.process_line("1023\r\n", &inverted).unwrap();
        assert_eq!(events, vec![SliderMoveEvent { slider_id: 0, percent_value: 0.0 }]);
    }
}
