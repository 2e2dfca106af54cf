//! Per-node outbound split ratios ("dispositions").
//!
//! A [`RatioSet`] holds one ratio per outgoing connection. The ratios always
//! sum to a fixed constant. Editing one ratio with [`RatioSet::set_one`]
//! rescales the others in proportion to their current values, so dragging
//! one slider makes the rest give way without losing their relative shares.
//! When every other ratio is zero there is no proportion to preserve and the
//! remainder is split evenly instead.

use std::fmt::Debug;

use crate::error::ErrorKind;

/// Errors from constructing or editing a [`RatioSet`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispositionError {
    #[error("a ratio set needs at least one entry")]
    Empty,
    #[error("ratio sum must be positive and finite, got {0}")]
    InvalidSum(f64),
    #[error("duplicate ratio entry {0}")]
    DuplicateEntry(String),
    #[error("requested ratio must be a non-negative number, got {0}")]
    InvalidValue(f64),
    #[error("unknown ratio entry {0}")]
    UnknownEntry(String),
    #[error("ratios sum to {actual} after edit, expected {expected}")]
    SumDrift { expected: f64, actual: f64 },
}

impl DispositionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispositionError::Empty
            | DispositionError::InvalidSum(_)
            | DispositionError::DuplicateEntry(_)
            | DispositionError::InvalidValue(_) => ErrorKind::InvalidArgument,
            DispositionError::UnknownEntry(_) => ErrorKind::NotFound,
            DispositionError::SumDrift { .. } => ErrorKind::InvariantViolation,
        }
    }
}

/// Default absolute tolerance for the conservation check.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// An ordered set of named ratios summing to a constant.
#[derive(Debug, Clone, PartialEq)]
pub struct RatioSet<K> {
    /// Entries in insertion order. Small (one per outgoing connection), so
    /// linear lookup beats hashing.
    entries: Vec<(K, f64)>,
    sum: f64,
    tolerance: f64,
}

impl<K: Copy + Eq + Debug> RatioSet<K> {
    /// Create a set where every key starts at `sum / count`.
    ///
    /// # Examples
    ///
    /// ```
    /// use flowlines_core::disposition::RatioSet;
    ///
    /// let ratios = RatioSet::new(["a", "b", "c"], 30.0).unwrap();
    /// assert_eq!(ratios.get("b"), Some(10.0));
    /// ```
    pub fn new<I: IntoIterator<Item = K>>(keys: I, sum: f64) -> Result<Self, DispositionError> {
        if !(sum.is_finite() && sum > 0.0) {
            return Err(DispositionError::InvalidSum(sum));
        }
        let mut entries: Vec<(K, f64)> = Vec::new();
        for key in keys {
            if entries.iter().any(|(k, _)| *k == key) {
                return Err(DispositionError::DuplicateEntry(format!("{key:?}")));
            }
            entries.push((key, 0.0));
        }
        if entries.is_empty() {
            return Err(DispositionError::Empty);
        }
        let initial = sum / entries.len() as f64;
        for (_, value) in &mut entries {
            *value = initial;
        }
        Ok(Self {
            entries,
            sum,
            tolerance: DEFAULT_TOLERANCE,
        })
    }

    /// Override the conservation tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set one ratio and redistribute the remainder over the others.
    ///
    /// `observer` is called synchronously with every entry whose value was
    /// written: the edited entry first (with its clamped value), then the
    /// others in insertion order. Returns the value actually stored for
    /// `key`.
    ///
    /// Arguments are validated before anything is written, so an `Err`
    /// other than [`DispositionError::SumDrift`] leaves the set untouched.
    pub fn set_one<F>(
        &mut self,
        key: K,
        requested: f64,
        mut observer: F,
    ) -> Result<f64, DispositionError>
    where
        F: FnMut(K, f64),
    {
        // Negated comparison so NaN is rejected too.
        if !(requested >= 0.0) {
            return Err(DispositionError::InvalidValue(requested));
        }
        let index = self
            .position(key)
            .ok_or_else(|| DispositionError::UnknownEntry(format!("{key:?}")))?;

        // A lone ratio has nothing to trade with and stays pinned at the sum.
        let value = if self.entries.len() == 1 {
            self.sum
        } else {
            requested.min(self.sum)
        };
        self.entries[index].1 = value;
        observer(key, value);

        let remainder = self.sum - value;
        let others_sum: f64 = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, (_, v))| *v)
            .sum();

        if others_sum > 0.0 {
            for (i, (k, v)) in self.entries.iter_mut().enumerate() {
                if i == index {
                    continue;
                }
                // Divide first: `v / others_sum <= 1` cannot overflow.
                *v = *v / others_sum * remainder;
                observer(*k, *v);
            }
        } else if self.entries.len() > 1 {
            let share = remainder / (self.entries.len() - 1) as f64;
            for (i, (k, v)) in self.entries.iter_mut().enumerate() {
                if i == index {
                    continue;
                }
                *v = share;
                observer(*k, *v);
            }
        }

        self.check_conservation()?;
        Ok(value)
    }

    fn check_conservation(&self) -> Result<(), DispositionError> {
        let actual = self.total();
        let allowed = self.tolerance * self.sum.max(1.0);
        let conserved = (actual - self.sum).abs() <= allowed;
        debug_assert!(
            conserved,
            "disposition sum drifted: {actual} vs {}",
            self.sum
        );
        if conserved {
            Ok(())
        } else {
            Err(DispositionError::SumDrift {
                expected: self.sum,
                actual,
            })
        }
    }

    fn position(&self, key: K) -> Option<usize> {
        self.entries.iter().position(|(k, _)| *k == key)
    }

    pub fn get(&self, key: K) -> Option<f64> {
        self.position(key).map(|i| self.entries[i].1)
    }

    pub fn contains(&self, key: K) -> bool {
        self.position(key).is_some()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The constant the ratios sum to.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// The current actual total of all ratios.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    /// Each ratio as a fraction of the total, in insertion order.
    pub fn shares(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        let total = self.total();
        self.entries.iter().map(move |(k, v)| (*k, *v / total))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
