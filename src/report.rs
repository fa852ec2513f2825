#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Summary statistics over a batch of grading results.

use std::fmt::Display;

use serde::Serialize;
use tabled::Tabled;

use crate::types::GradingResult;

/// Percentage needed to pass.
pub const PASS_PERCENTAGE: f64 = 60.0;

/// Letter grade bands on the percentage scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Letter {
    /// 90% and above.
    A,
    /// 80% up to 90%.
    B,
    /// 70% up to 80%.
    C,
    /// 60% up to 70%.
    D,
    /// Below 60%.
    F,
}

impl Display for Letter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Maps a percentage to its letter grade.
pub fn letter_grade(percentage: f64) -> Letter {
    match percentage {
        p if p >= 90.0 => Letter::A,
        p if p >= 80.0 => Letter::B,
        p if p >= 70.0 => Letter::C,
        p if p >= PASS_PERCENTAGE => Letter::D,
        _ => Letter::F,
    }
}

/// Formats a percentage with its letter, eg. `B (82.0%)`.
pub fn format_grade(percentage: f64) -> String {
    format!("{} ({percentage:.1}%)", letter_grade(percentage))
}

/// Count of results per letter grade.
#[derive(Tabled, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    /// Results graded A.
    #[tabled(rename = "A")]
    pub a: usize,
    /// Results graded B.
    #[tabled(rename = "B")]
    pub b: usize,
    /// Results graded C.
    #[tabled(rename = "C")]
    pub c: usize,
    /// Results graded D.
    #[tabled(rename = "D")]
    pub d: usize,
    /// Results graded F.
    #[tabled(rename = "F")]
    pub f: usize,
}

impl GradeDistribution {
    /// Adds one result with the given letter.
    fn record(&mut self, letter: Letter) {
        match letter {
            Letter::A => self.a += 1,
            Letter::B => self.b += 1,
            Letter::C => self.c += 1,
            Letter::D => self.d += 1,
            Letter::F => self.f += 1,
        }
    }
}

/// Aggregate view of a batch, on the percentage scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    /// Number of results summarized.
    pub total_submissions:  usize,
    /// Arithmetic mean.
    pub average:            f64,
    /// Middle value; the upper of the two middle values for even counts.
    pub median:             f64,
    /// Best result.
    pub highest:            f64,
    /// Worst result.
    pub lowest:             f64,
    /// Sample standard deviation; zero for a single result.
    pub standard_deviation: f64,
    /// Share of results at or above [`PASS_PERCENTAGE`], as a percentage.
    pub pass_rate:          f64,
    /// Results per letter grade.
    pub distribution:       GradeDistribution,
}

impl BatchSummary {
    /// Summarizes `results`; `None` when there is nothing to summarize.
    pub fn from_results<'a, I>(results: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GradingResult>,
    {
        let mut percentages: Vec<f64> = results.into_iter().map(GradingResult::percentage).collect();
        if percentages.is_empty() {
            return None;
        }
        percentages.sort_by(f64::total_cmp);

        let n = percentages.len();
        let average = percentages.iter().sum::<f64>() / n as f64;
        let standard_deviation = if n > 1 {
            let variance =
                percentages.iter().map(|p| (p - average).powi(2)).sum::<f64>() / (n - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        let mut distribution = GradeDistribution::default();
        for p in &percentages {
            distribution.record(letter_grade(*p));
        }
        let passed = percentages.iter().filter(|p| **p >= PASS_PERCENTAGE).count();

        Some(Self {
            total_submissions: n,
            average,
            median: percentages[n / 2],
            highest: percentages[n - 1],
            lowest: percentages[0],
            standard_deviation,
            pass_rate: passed as f64 / n as f64 * 100.0,
            distribution,
        })
    }
}
