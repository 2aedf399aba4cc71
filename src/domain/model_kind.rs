use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::ConfigError;

/// Which model family a run fine-tunes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ModelKind {
    /// Encoder with a three-way classification head
    Bert,
    /// Encoder-decoder that generates the label word
    T5,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Bert => "bert",
            ModelKind::T5   => "t5",
        }
    }

    /// HuggingFace Hub repository of the matching pretrained tokenizer.
    pub fn pretrained_id(self) -> &'static str {
        match self {
            ModelKind::Bert => "bert-base-uncased",
            ModelKind::T5   => "t5-small",
        }
    }

    pub fn is_generative(self) -> bool {
        self == ModelKind::T5
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bert" => Ok(ModelKind::Bert),
            "t5"   => Ok(ModelKind::T5),
            other  => Err(ConfigError::UnknownModel(other.to_string())),
        }
    }
}

impl From<ModelKind> for String {
    fn from(m: ModelKind) -> Self {
        m.as_str().to_string()
    }
}

impl TryFrom<String> for ModelKind {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_pretrained_ids() {
        assert_eq!("bert".parse::<ModelKind>().unwrap().pretrained_id(), "bert-base-uncased");
        assert_eq!("t5".parse::<ModelKind>().unwrap().pretrained_id(), "t5-small");
        assert_eq!("gpt2".parse::<ModelKind>(), Err(ConfigError::UnknownModel("gpt2".into())));
    }

    #[test]
    fn test_serde_as_string() {
        assert_eq!(serde_json::to_string(&ModelKind::T5).unwrap(), "\"t5\"");
        let m: ModelKind = serde_json::from_str("\"bert\"").unwrap();
        assert_eq!(m, ModelKind::Bert);
    }
}
