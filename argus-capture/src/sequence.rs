//! Plage de balayage de luminosité
//!
//! Une plage `(start, end, step)` est parcourue en intervalle fermé dans le
//! sens du pas. La validation est synchrone et sans effet de bord: une plage
//! invalide ne doit jamais toucher l'éclairage ni déclencher une capture.

use std::fmt;

use crate::CaptureError;

/// Plage de balayage `(start, end, step)`, pas non nul
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    /// Première valeur de luminosité
    pub start: i32,

    /// Borne de fin, incluse quand `(end - start)` est un multiple du pas
    pub end: i32,

    /// Pas de progression, négatif pour un balayage décroissant
    pub step: i32,
}

impl SequenceRange {
    /// Crée une plage sans la valider
    pub fn new(start: i32, end: i32, step: i32) -> Self {
        Self { start, end, step }
    }

    /// Valide la plage
    ///
    /// Rejette un pas nul, un pas positif avec `start > end` et un pas
    /// négatif avec `start < end`.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.step == 0 {
            return Err(CaptureError::InvalidRange(
                "Le pas ne peut pas être nul".to_string(),
            ));
        }

        if self.step > 0 && self.start > self.end {
            return Err(CaptureError::InvalidRange(format!(
                "Avec un pas positif, start <= end est requis ({} > {})",
                self.start, self.end
            )));
        }

        if self.step < 0 && self.start < self.end {
            return Err(CaptureError::InvalidRange(format!(
                "Avec un pas négatif, start >= end est requis ({} < {})",
                self.start, self.end
            )));
        }

        Ok(())
    }

    /// Nombre de pas d'une plage valide: ⌊(end − start) / step⌋ + 1
    pub fn step_count(&self) -> usize {
        if self.step == 0 {
            return 0;
        }

        let span = (self.end as i64) - (self.start as i64);
        let step = self.step as i64;
        if (self.step > 0 && span < 0) || (self.step < 0 && span > 0) {
            return 0;
        }

        (span / step) as usize + 1
    }

    /// Itérateur sur les valeurs de la plage, dans le sens du pas
    pub fn values(&self) -> SequenceValues {
        SequenceValues {
            current: self.start as i64,
            end: self.end as i64,
            step: self.step as i64,
        }
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {} (pas {})", self.start, self.end, self.step)
    }
}

/// Itérateur des valeurs d'une [`SequenceRange`]
#[derive(Debug, Clone)]
pub struct SequenceValues {
    /// Prochaine valeur à rendre
    current: i64,

    /// Borne de fin incluse
    end: i64,

    /// Pas de progression
    step: i64,
}

impl Iterator for SequenceValues {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.step == 0 {
            return None;
        }
        if self.step > 0 && self.current > self.end {
            return None;
        }
        if self.step < 0 && self.current < self.end {
            return None;
        }

        let value = self.current;
        self.current += self.step;
        Some(value as i32)
    }
}
