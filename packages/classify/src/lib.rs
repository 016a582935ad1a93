#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Choropleth classification.
//!
//! Turns a numeric measure (county population) into class breaks and maps
//! each value to a class index. Three methods are supported:
//!
//! * [`ClassificationMethod::Quantile`]: linearly interpolated percentiles.
//! * [`ClassificationMethod::EqualInterval`]: uniform steps from min to max.
//! * [`ClassificationMethod::NaturalBreaks`]: values at evenly spaced sorted
//!   positions. This approximates Jenks natural breaks; it does not
//!   minimize within-class variance and its breaks must stay as they are.

pub mod palette;

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

pub use palette::{ColorScheme, NO_DATA_COLOR, NO_DATA_LABEL};

/// Default number of classes.
pub const DEFAULT_CLASSES: usize = 5;

/// A break-computation method.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ClassificationMethod {
    /// Equal count per class.
    #[default]
    #[strum(to_string = "Quantile", serialize = "quantiles")]
    Quantile,
    /// Equal value range per class.
    #[strum(to_string = "Equal Interval", serialize = "equal_interval", serialize = "equal-interval")]
    EqualInterval,
    /// Index-spaced approximation of Jenks natural breaks.
    #[strum(
        to_string = "Natural Breaks (Jenks)",
        serialize = "natural_breaks",
        serialize = "natural-breaks",
        serialize = "jenks"
    )]
    NaturalBreaks,
}

impl ClassificationMethod {
    /// Parses a method name; anything unrecognized is
    /// [`ClassificationMethod::Quantile`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        name.trim().parse().unwrap_or_else(|_| {
            log::debug!("Unknown classification method {name:?}, using Quantile");
            Self::Quantile
        })
    }
}

/// Ordered class upper bounds.
///
/// Non-decreasing; the last break is the sample maximum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassBreaks(Vec<f64>);

impl ClassBreaks {
    /// The breaks as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no classes (empty input).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index of the first break `>= value`; the last class if none is.
    /// A value equal to a break falls in the lower class. Empty breaks
    /// give class 0.
    #[must_use]
    pub fn class_index(&self, value: f64) -> usize {
        self.0
            .iter()
            .position(|&b| value <= b)
            .unwrap_or_else(|| self.0.len().saturating_sub(1))
    }
}

impl From<Vec<f64>> for ClassBreaks {
    fn from(breaks: Vec<f64>) -> Self {
        Self(breaks)
    }
}

/// Keeps only strictly positive, finite values. Everything else is "no
/// data" and takes no part in break computation.
#[must_use]
pub fn positive_values(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect()
}

/// Computes `classes` breaks for `values` (already filtered by the
/// caller). Empty input or zero classes give no breaks.
#[must_use]
pub fn classify(values: &[f64], method: ClassificationMethod, classes: usize) -> ClassBreaks {
    if values.is_empty() || classes == 0 {
        return ClassBreaks::default();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let breaks = match method {
        ClassificationMethod::Quantile => quantile_breaks(&sorted, classes),
        ClassificationMethod::EqualInterval => equal_interval_breaks(&sorted, classes),
        ClassificationMethod::NaturalBreaks => natural_breaks(&sorted, classes),
    };

    log::debug!("{method} breaks over {} values: {breaks:?}", sorted.len());
    ClassBreaks(breaks)
}

/// Linear interpolation at rank `p * (n - 1)` of a sorted sample.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = rank - lower as f64;
    fraction.mul_add(sorted[upper] - sorted[lower], sorted[lower])
}

#[allow(clippy::cast_precision_loss)]
fn quantile_breaks(sorted: &[f64], classes: usize) -> Vec<f64> {
    let max = sorted[sorted.len() - 1];
    (1..classes)
        .map(|i| percentile(sorted, i as f64 / classes as f64))
        .chain(std::iter::once(max))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn equal_interval_breaks(sorted: &[f64], classes: usize) -> Vec<f64> {
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let interval = (max - min) / classes as f64;
    let mut breaks: Vec<f64> = (1..=classes)
        .map(|i| interval.mul_add(i as f64, min))
        .collect();
    // Rounding may leave the top break a hair under the max.
    if let Some(last) = breaks.last_mut() {
        *last = last.max(max);
    }
    breaks
}

fn natural_breaks(sorted: &[f64], classes: usize) -> Vec<f64> {
    let n = sorted.len();
    (1..classes)
        .map(|i| sorted[(i * n / classes).min(n - 1)])
        .chain(std::iter::once(sorted[n - 1]))
        .collect()
}

/// One legend row.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    /// Lower bound (exclusive except for the first class).
    pub lower: f64,
    /// Upper bound (inclusive).
    pub upper: f64,
    /// Fill color.
    pub color: &'static str,
    /// Display label, e.g. `"1,200 - 45,000"`.
    pub label: String,
}

/// Classification of a whole feature set.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoroplethLayer {
    /// Method used.
    pub method: ClassificationMethod,
    /// Computed breaks.
    pub breaks: ClassBreaks,
    /// Per input value: its class, or `None` for no data.
    pub classes: Vec<Option<usize>>,
    min: Option<f64>,
}

impl ChoroplethLayer {
    /// Classifies `values` (one per feature, in feature order).
    #[must_use]
    pub fn build(values: &[f64], method: ClassificationMethod, classes: usize) -> Self {
        let valid = positive_values(values);
        let breaks = classify(&valid, method, classes);
        let min = valid.iter().copied().reduce(f64::min);

        let classes = values
            .iter()
            .map(|&v| {
                (v.is_finite() && v > 0.0 && !breaks.is_empty()).then(|| breaks.class_index(v))
            })
            .collect();

        Self {
            method,
            breaks,
            classes,
            min,
        }
    }

    /// Number of features without data.
    #[must_use]
    pub fn no_data_count(&self) -> usize {
        self.classes.iter().filter(|c| c.is_none()).count()
    }

    /// Fill color of the feature at `index`.
    #[must_use]
    pub fn fill(&self, index: usize, scheme: ColorScheme) -> &'static str {
        match self.classes.get(index).copied().flatten() {
            Some(class) => scheme.color(class, self.breaks.len()),
            None => NO_DATA_COLOR,
        }
    }

    /// Legend rows, one per class. The first class starts at the sample
    /// minimum; every other class starts at the previous break.
    #[must_use]
    pub fn legend(&self, scheme: ColorScheme) -> Vec<LegendEntry> {
        let Some(min) = self.min else {
            return Vec::new();
        };
        let breaks = self.breaks.as_slice();
        breaks
            .iter()
            .enumerate()
            .map(|(i, &upper)| {
                let lower = if i == 0 { min } else { breaks[i - 1] };
                LegendEntry {
                    lower,
                    upper,
                    color: scheme.color(i, breaks.len()),
                    label: format!("{} - {}", group_thousands(lower), group_thousands(upper)),
                }
            })
            .collect()
    }
}

/// Formats the integer part of `value` with `,` thousands separators.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn group_thousands(value: f64) -> String {
    let whole = value.trunc() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if whole < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
