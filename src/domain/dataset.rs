// ============================================================
// Layer 3 — Dataset Identifiers
// ============================================================
// Every example carries the integer id of the dataset split it
// came from. The id travels through batching untouched and is
// what the step and epoch-end logic branch on:
//
//   id  string                        family  labels
//   0   mnli_train                    MNLI    3-way
//   1   mnli_validation_matched       MNLI    3-way
//   2   mnli_validation_mismatched    MNLI    3-way
//   3   snli_train                    SNLI    3-way
//   4   snli_validation               SNLI    3-way
//   5   snli_test                     SNLI    3-way
//   6   hans_train                    HANS    2-way
//   7   hans_validation               HANS    2-way

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::ConfigError;

/// The corpus a dataset split belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetFamily {
    Mnli,
    Snli,
    Hans,
}

/// A concrete dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DatasetId {
    MnliTrain,
    MnliValidationMatched,
    MnliValidationMismatched,
    SnliTrain,
    SnliValidation,
    SnliTest,
    HansTrain,
    HansValidation,
}

impl DatasetId {
    pub const ALL: [DatasetId; 8] = [
        DatasetId::MnliTrain,
        DatasetId::MnliValidationMatched,
        DatasetId::MnliValidationMismatched,
        DatasetId::SnliTrain,
        DatasetId::SnliValidation,
        DatasetId::SnliTest,
        DatasetId::HansTrain,
        DatasetId::HansValidation,
    ];

    /// Integer code stored in batches and in the per-example tables.
    pub fn code(self) -> i64 {
        match self {
            DatasetId::MnliTrain                => 0,
            DatasetId::MnliValidationMatched    => 1,
            DatasetId::MnliValidationMismatched => 2,
            DatasetId::SnliTrain                => 3,
            DatasetId::SnliValidation           => 4,
            DatasetId::SnliTest                 => 5,
            DatasetId::HansTrain                => 6,
            DatasetId::HansValidation           => 7,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.code() == code)
    }

    /// Name used in file names and metric keys.
    pub fn as_str(self) -> &'static str {
        match self {
            DatasetId::MnliTrain                => "mnli_train",
            DatasetId::MnliValidationMatched    => "mnli_validation_matched",
            DatasetId::MnliValidationMismatched => "mnli_validation_mismatched",
            DatasetId::SnliTrain                => "snli_train",
            DatasetId::SnliValidation           => "snli_validation",
            DatasetId::SnliTest                 => "snli_test",
            DatasetId::HansTrain                => "hans_train",
            DatasetId::HansValidation           => "hans_validation",
        }
    }

    pub fn family(self) -> DatasetFamily {
        match self {
            DatasetId::MnliTrain
            | DatasetId::MnliValidationMatched
            | DatasetId::MnliValidationMismatched => DatasetFamily::Mnli,
            DatasetId::SnliTrain | DatasetId::SnliValidation | DatasetId::SnliTest => {
                DatasetFamily::Snli
            }
            DatasetId::HansTrain | DatasetId::HansValidation => DatasetFamily::Hans,
        }
    }

    pub fn is_hans(self) -> bool {
        self.family() == DatasetFamily::Hans
    }

    /// MNLI and SNLI splits get step-level logs and handcrafted-type breakdowns.
    pub fn is_three_way_corpus(self) -> bool {
        matches!(self.family(), DatasetFamily::Mnli | DatasetFamily::Snli)
    }

    /// Number of classes in the dataset's own label space.
    pub fn num_labels(self) -> usize {
        if self.is_hans() { 2 } else { 3 }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownDataset(s.to_string()))
    }
}

impl From<DatasetId> for String {
    fn from(d: DatasetId) -> Self {
        d.as_str().to_string()
    }
}

impl TryFrom<String> for DatasetId {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Parse a comma separated list such as `mnli_validation_matched,hans_validation`.
pub fn parse_dataset_list(s: &str) -> Result<Vec<DatasetId>, ConfigError> {
    s.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for d in DatasetId::ALL {
            assert_eq!(DatasetId::from_code(d.code()), Some(d));
        }
        assert_eq!(DatasetId::from_code(42), None);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("hans_validation".parse::<DatasetId>().unwrap(), DatasetId::HansValidation);
        assert!(matches!(
            "mnli_test".parse::<DatasetId>(),
            Err(ConfigError::UnknownDataset(_))
        ));
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        let ds = parse_dataset_list("mnli_train, hans_train,").unwrap();
        assert_eq!(ds, vec![DatasetId::MnliTrain, DatasetId::HansTrain]);
    }

    #[test]
    fn test_families() {
        assert!(DatasetId::HansTrain.is_hans());
        assert!(DatasetId::SnliTest.is_three_way_corpus());
        assert_eq!(DatasetId::HansValidation.num_labels(), 2);
        assert_eq!(DatasetId::MnliValidationMatched.num_labels(), 3);
    }
}
