// src/identity.rs
//
// Identity resolution for recovered on/off sequences.
//
// The tracker hands the matcher the most recent `reference_length` LED
// states of a track. The matcher answers with the index of the reference
// code the sequence corresponds to, or nothing. Structurally dead sequences
// (three consecutive OFF states) never reach the matcher; they are reported
// as `Identity::Invalid` by the caller.

use crate::error::{Result, TrackerError};
use serde::Serialize;
use std::fmt;

/// A blinking marker cannot stay dark for this many consecutive frames.
pub const DEAD_RUN_LENGTH: usize = 3;

/// Outcome of identity resolution for one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Identity {
    /// Index into the configured code set
    Code(usize),
    /// No code correlated strongly enough
    Unmatched,
    /// On/off pattern impossible for a live marker
    Invalid,
}

impl Identity {
    pub fn code(&self) -> Option<usize> {
        match self {
            Self::Code(index) => Some(*index),
            _ => None,
        }
    }

    /// Integer form used on the wire: index, -1 unmatched, -2 invalid.
    pub fn raw(&self) -> i32 {
        match self {
            Self::Code(index) => *index as i32,
            Self::Unmatched => -1,
            Self::Invalid => -2,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(index) => write!(f, "ID{}", index),
            Self::Unmatched => write!(f, "UNMATCHED"),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Maps an ordered on/off sequence to a reference code.
pub trait SignalMatcher: Send + Sync {
    /// Index of the matching reference code, or `None` when nothing matches.
    fn match_sequence(&self, sequence: &[bool]) -> Option<usize>;

    /// Length shared by all reference codes.
    fn reference_length(&self) -> usize;
}

/// True when `states` contains `DEAD_RUN_LENGTH` consecutive OFF entries.
pub fn contains_dead_run(states: &[bool]) -> bool {
    states
        .windows(DEAD_RUN_LENGTH)
        .any(|w| w.iter().all(|on| !on))
}

/// Parse one textual code ("1010", "1,0,1,0", "1 0 1 0").
pub fn parse_code(index: usize, text: &str) -> Result<Vec<bool>> {
    let mut code = Vec::with_capacity(text.len());
    for symbol in text.chars() {
        match symbol {
            '1' => code.push(true),
            '0' => code.push(false),
            ',' | ' ' | '\t' | '_' => {}
            other => return Err(TrackerError::InvalidCode { index, symbol: other }),
        }
    }
    Ok(code)
}

pub fn parse_code_set<S: AsRef<str>>(texts: &[S]) -> Result<Vec<Vec<bool>>> {
    let codes = texts
        .iter()
        .enumerate()
        .map(|(i, t)| parse_code(i, t.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    validate_code_set(&codes)?;
    Ok(codes)
}

/// Check a code set and return its common length.
pub fn validate_code_set(codes: &[Vec<bool>]) -> Result<usize> {
    let first = codes.first().ok_or(TrackerError::EmptyCodeSet)?;
    let expected = first.len();
    for (index, code) in codes.iter().enumerate() {
        if code.is_empty() {
            return Err(TrackerError::EmptyCode { index });
        }
        if code.len() != expected {
            return Err(TrackerError::CodeLengthMismatch {
                index,
                expected,
                found: code.len(),
            });
        }
    }
    Ok(expected)
}

/// Compares a sequence against every cyclic shift of every reference code.
///
/// The camera samples a marker at an arbitrary phase of its code, so a
/// window of `reference_length` states is a rotation of the code it belongs
/// to. The score is the fraction of agreeing positions; the best score wins
/// (lowest code index on ties) if it reaches `min_match_ratio`.
#[derive(Debug, Clone)]
pub struct CrossCorrelationMatcher {
    codes: Vec<Vec<bool>>,
    reference_length: usize,
    min_match_ratio: f64,
}

impl CrossCorrelationMatcher {
    pub fn new(codes: Vec<Vec<bool>>, min_match_ratio: f64) -> Result<Self> {
        let reference_length = validate_code_set(&codes)?;
        if !(min_match_ratio > 0.0 && min_match_ratio <= 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "min_match_ratio must lie in (0, 1], got {}",
                min_match_ratio
            )));
        }
        Ok(Self {
            codes,
            reference_length,
            min_match_ratio,
        })
    }

    pub fn codes(&self) -> &[Vec<bool>] {
        &self.codes
    }

    /// Best agreement ratio of `window` against any rotation of `code`.
    fn best_shift_score(code: &[bool], window: &[bool]) -> f64 {
        let n = code.len();
        (0..n)
            .map(|shift| {
                let agree = window
                    .iter()
                    .enumerate()
                    .filter(|(i, state)| code[(i + shift) % n] == **state)
                    .count();
                agree as f64 / n as f64
            })
            .fold(0.0, f64::max)
    }
}

impl SignalMatcher for CrossCorrelationMatcher {
    fn match_sequence(&self, sequence: &[bool]) -> Option<usize> {
        if sequence.len() < self.reference_length {
            return None;
        }
        let window = &sequence[sequence.len() - self.reference_length..];

        let mut best: Option<(usize, f64)> = None;
        for (index, code) in self.codes.iter().enumerate() {
            let score = Self::best_shift_score(code, window);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((index, score));
            }
        }

        best.filter(|(_, score)| *score >= self.min_match_ratio)
            .map(|(index, _)| index)
    }

    fn reference_length(&self) -> usize {
        self.reference_length
    }
}
