use ndarray::{Array2, Zip};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::{Error, Matrix, Result};

/// Outcome of comparing one predicted cell against its ground truth.
///
/// The discriminants are the values stored in the label matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Outcome {
    TruePositive = 1,
    FalsePositive = 2,
    TrueNegative = 3,
    FalseNegative = 4,
}

impl Outcome {
    /// All outcomes in label order.
    pub const ALL: [Outcome; 4] = [
        Outcome::TruePositive,
        Outcome::FalsePositive,
        Outcome::TrueNegative,
        Outcome::FalseNegative,
    ];

    pub fn classify(predicted: bool, actual: bool) -> Self {
        match (predicted, actual) {
            (true, true) => Outcome::TruePositive,
            (true, false) => Outcome::FalsePositive,
            (false, false) => Outcome::TrueNegative,
            (false, true) => Outcome::FalseNegative,
        }
    }

    /// Value of this outcome in the label matrix (1..=4).
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Outcome::ALL.into_iter().find(|o| o.code() == code)
    }

    /// Human readable name, as used in the report and the legend.
    pub fn name(self) -> &'static str {
        match self {
            Outcome::TruePositive => "True positives",
            Outcome::FalsePositive => "False positives",
            Outcome::TrueNegative => "True negatives",
            Outcome::FalseNegative => "False negatives",
        }
    }
}

/// Number of cells per outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl Counts {
    pub fn record(&mut self, outcome: Outcome) {
        *self.get_mut(outcome) += 1;
    }

    pub fn get(&self, outcome: Outcome) -> usize {
        match outcome {
            Outcome::TruePositive => self.true_positives,
            Outcome::FalsePositive => self.false_positives,
            Outcome::TrueNegative => self.true_negatives,
            Outcome::FalseNegative => self.false_negatives,
        }
    }

    fn get_mut(&mut self, outcome: Outcome) -> &mut usize {
        match outcome {
            Outcome::TruePositive => &mut self.true_positives,
            Outcome::FalsePositive => &mut self.false_positives,
            Outcome::TrueNegative => &mut self.true_negatives,
            Outcome::FalseNegative => &mut self.false_negatives,
        }
    }

    pub fn total(&self) -> usize {
        Outcome::ALL.iter().map(|&o| self.get(o)).sum()
    }

    /// Share of each outcome in percent of the total cell count.
    ///
    /// Fails with [`Error::EmptyInput`] when nothing was counted.
    pub fn percentages(&self) -> Result<Percentages> {
        let total = self.total();
        if total == 0 {
            return Err(Error::EmptyInput(
                "no cells were classified, percentages are undefined".into(),
            ));
        }
        let pct = |count: usize| 100.0 * count as f64 / total as f64;
        Ok(Percentages {
            true_positives: pct(self.true_positives),
            false_positives: pct(self.false_positives),
            true_negatives: pct(self.true_negatives),
            false_negatives: pct(self.false_negatives),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentages {
    pub true_positives: f64,
    pub false_positives: f64,
    pub true_negatives: f64,
    pub false_negatives: f64,
}

impl Percentages {
    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::TruePositive => self.true_positives,
            Outcome::FalsePositive => self.false_positives,
            Outcome::TrueNegative => self.true_negatives,
            Outcome::FalseNegative => self.false_negatives,
        }
    }

    /// Report lines in label order, e.g. `True positives : 25.0%`.
    pub fn report_lines(&self) -> Vec<String> {
        Outcome::ALL
            .iter()
            .map(|&o| format!("{} : {:?}%", o.name(), self.get(o)))
            .collect()
    }
}

/// Counts and percentages of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub rows: usize,
    pub cols: usize,
    pub counts: Counts,
    pub percentages: Percentages,
}

impl Summary {
    /// Saves the summary as pretty printed JSON.
    pub fn save_to_file(
        &self,
        file: &mut dyn std::io::Write,
    ) -> std::result::Result<(), serde_json::Error> {
        let serialized = serde_json::to_string_pretty(self)?;
        file.write_all(serialized.as_bytes())
            .map_err(serde_json::Error::custom)
    }
}

/// Per-cell confusion labels of a binary prediction against its ground truth.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    labels: Array2<u8>,
    counts: Counts,
}

impl ConfusionMatrix {
    /// Label matrix holding [`Outcome::code`] values, same shape as the inputs.
    pub fn labels(&self) -> &Array2<u8> {
        &self.labels
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.total()
    }

    pub fn percentages(&self) -> Result<Percentages> {
        self.counts.percentages()
    }

    pub fn summary(&self) -> Result<Summary> {
        let (rows, cols) = self.labels.dim();
        Ok(Summary {
            rows,
            cols,
            counts: self.counts,
            percentages: self.percentages()?,
        })
    }

    pub fn outcome_at(&self, row: usize, col: usize) -> Option<Outcome> {
        self.labels
            .get((row, col))
            .and_then(|&code| Outcome::from_code(code))
    }
}

/// Compute the confusion labels of `predicted` against `ground_truth`.
///
/// Both matrices must have the same non-empty shape and contain only 0 and 1.
/// The label matrix is a fresh allocation; neither input is modified.
pub fn confusion_matrix(predicted: &Matrix, ground_truth: &Matrix) -> Result<ConfusionMatrix> {
    if predicted.dim() != ground_truth.dim() {
        return Err(Error::ShapeMismatch {
            what: "ground truth".into(),
            expected: predicted.dim(),
            found: ground_truth.dim(),
        });
    }
    if predicted.is_empty() {
        return Err(Error::EmptyInput(format!(
            "matrices have shape {:?}",
            predicted.dim()
        )));
    }

    let predicted = binarize(predicted, "prediction")?;
    let actual = binarize(ground_truth, "ground truth")?;

    let mut counts = Counts::default();
    let labels = Zip::from(&predicted)
        .and(&actual)
        .map_collect(|&p, &a| {
            let outcome = Outcome::classify(p, a);
            counts.record(outcome);
            outcome.code()
        });

    Ok(ConfusionMatrix { labels, counts })
}

fn binarize(matrix: &Matrix, what: &str) -> Result<Array2<bool>> {
    if let Some(((row, col), value)) = matrix
        .indexed_iter()
        .find(|(_, v)| **v != 0.0 && **v != 1.0)
    {
        return Err(Error::InvalidInput(format!(
            "{what} has value {value} at ({row}, {col}), expected 0 or 1"
        )));
    }
    Ok(matrix.mapv(|v| v == 1.0))
}
