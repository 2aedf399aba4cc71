// ============================================================
// Layer 4 — Pair Encoder
// ============================================================
// Turns an NliExample into a fixed-length NliSample.
//
// Classifier input (BERT style):
//   [CLS] premise [SEP] hypothesis [SEP] [PAD]...
//   token_type_ids: 0 for [CLS] premise [SEP], 1 for the rest
//
// Generative input (T5 style):
//   "mnli hypothesis: <h> premise: <p>" </s> [PAD]...
//   target: tokens of the label word, </s>, padded to 5
//
// Long pairs are truncated longest-first so both sentences
// keep as many tokens as possible.

use anyhow::{anyhow, bail, Result};
use tokenizers::Tokenizer;

use crate::data::dataset::NliSample;
use crate::domain::{example::NliExample, heuristic::NO_HEURISTIC, label::NLI_LABEL_WORDS};

/// Length every generation target is padded to.
pub const LABEL_PAD_LENGTH: usize = 5;

/// Which input layout to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingStyle {
    Classifier,
    Generative,
}

/// Special token ids resolved from the tokenizer's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub pad: u32,
    pub cls: u32,
    pub sep: u32,
    pub eos: u32,
}

impl SpecialTokens {
    /// BERT-style names first, T5-style names second, fixed ids last.
    pub fn resolve(tokenizer: &Tokenizer) -> Self {
        let find = |names: &[&str]| names.iter().find_map(|n| tokenizer.token_to_id(n));
        let pad = find(&["[PAD]", "<pad>"]).unwrap_or(0);
        let cls = find(&["[CLS]"]).unwrap_or(101);
        let sep = find(&["[SEP]"]).unwrap_or(102);
        let eos = find(&["</s>"]).unwrap_or(sep);
        Self { pad, cls, sep, eos }
    }
}

pub struct PairEncoder {
    tokenizer:   Tokenizer,
    special:     SpecialTokens,
    style:       EncodingStyle,
    max_seq_len: usize,
    /// Padded target sequence per label id (generative only)
    targets:     Vec<Vec<u32>>,
}

impl PairEncoder {
    pub fn new(tokenizer: Tokenizer, style: EncodingStyle, max_seq_len: usize) -> Result<Self> {
        if max_seq_len < 8 {
            bail!("max_seq_len must be at least 8, got {max_seq_len}");
        }
        let special = SpecialTokens::resolve(&tokenizer);

        let mut targets = Vec::with_capacity(NLI_LABEL_WORDS.len());
        for word in NLI_LABEL_WORDS {
            let mut ids = tokenize(&tokenizer, word)?;
            ids.truncate(LABEL_PAD_LENGTH - 1);
            ids.push(special.eos);
            ids.resize(LABEL_PAD_LENGTH, special.pad);
            targets.push(ids);
        }
        // Predictions are decoded by matching whole target sequences
        if style == EncodingStyle::Generative
            && (targets[0] == targets[1] || targets[1] == targets[2] || targets[0] == targets[2])
        {
            bail!("Tokenizer maps two NLI label words to the same target sequence");
        }

        Ok(Self { tokenizer, special, style, max_seq_len, targets })
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn special(&self) -> SpecialTokens {
        self.special
    }

    /// Target token sequences indexed by label id.
    pub fn label_targets(&self) -> &[Vec<u32>] {
        &self.targets
    }

    pub fn encode(&self, example: &NliExample) -> Result<NliSample> {
        let (input_ids, token_type_ids) = match self.style {
            EncodingStyle::Classifier => self.encode_pair(example)?,
            EncodingStyle::Generative => self.encode_prompt(example)?,
        };

        let target_ids = usize::try_from(example.label)
            .ok()
            .and_then(|l| self.targets.get(l))
            .cloned()
            .unwrap_or_else(|| vec![self.special.pad; LABEL_PAD_LENGTH]);

        let seq_len            = input_ids.len();
        let mut input_ids      = input_ids;
        let mut token_type_ids = token_type_ids;
        let mut attention_mask = vec![1u32; seq_len];
        input_ids.resize(self.max_seq_len, self.special.pad);
        token_type_ids.resize(self.max_seq_len, 0);
        attention_mask.resize(self.max_seq_len, 0);

        Ok(NliSample {
            input_ids,
            attention_mask,
            token_type_ids,
            target_ids,
            idx:              example.idx,
            dataset:          example.dataset.code(),
            label:            example.label,
            handcrafted_type: example.handcrafted_type,
            heuristic:        example.heuristic.unwrap_or(NO_HEURISTIC),
        })
    }

    pub fn encode_all(&self, examples: &[NliExample]) -> Result<Vec<NliSample>> {
        examples.iter().map(|e| self.encode(e)).collect()
    }

    fn encode_pair(&self, example: &NliExample) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut premise    = tokenize(&self.tokenizer, &example.premise)?;
        let mut hypothesis = tokenize(&self.tokenizer, &example.hypothesis)?;
        truncate_longest_first(&mut premise, &mut hypothesis, self.max_seq_len - 3);

        let mut ids = Vec::with_capacity(self.max_seq_len);
        ids.push(self.special.cls);
        ids.extend_from_slice(&premise);
        ids.push(self.special.sep);
        let first_segment = ids.len();
        ids.extend_from_slice(&hypothesis);
        ids.push(self.special.sep);

        let mut types = vec![0u32; first_segment];
        types.resize(ids.len(), 1);
        Ok((ids, types))
    }

    fn encode_prompt(&self, example: &NliExample) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut hypothesis = tokenize(&self.tokenizer, &example.hypothesis)?;
        let mut premise    = tokenize(&self.tokenizer, &example.premise)?;
        let mut prefix     = tokenize(&self.tokenizer, "mnli hypothesis:")?;
        let infix          = tokenize(&self.tokenizer, "premise:")?;

        let fixed = prefix.len() + infix.len() + 1;
        if fixed >= self.max_seq_len {
            bail!("max_seq_len {} is too short for the generative prompt", self.max_seq_len);
        }
        truncate_longest_first(&mut hypothesis, &mut premise, self.max_seq_len - fixed);

        prefix.extend_from_slice(&hypothesis);
        prefix.extend_from_slice(&infix);
        prefix.extend_from_slice(&premise);
        prefix.push(self.special.eos);

        let types = vec![0u32; prefix.len()];
        Ok((prefix, types))
    }
}

fn tokenize(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>> {
    let enc = tokenizer
        .encode(text, false)
        .map_err(|e| anyhow!("Tokenisation error: {e}"))?;
    Ok(enc.get_ids().to_vec())
}

/// Drop tokens from the end of the longer sequence until both fit in `budget`.
fn truncate_longest_first(a: &mut Vec<u32>, b: &mut Vec<u32>, budget: usize) {
    while a.len() + b.len() > budget {
        if a.len() >= b.len() {
            a.pop();
        } else {
            b.pop();
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::DatasetId;
    use crate::infra::tokenizer_store::build_word_level;

    fn encoder(style: EncodingStyle, max_seq_len: usize) -> PairEncoder {
        let texts = vec!["the cat sat on the mat".to_string()];
        let tok   = build_word_level(&texts, 100).unwrap();
        PairEncoder::new(tok, style, max_seq_len).unwrap()
    }

    #[test]
    fn test_truncate_longest_first() {
        let mut a = vec![1, 2, 3, 4, 5];
        let mut b = vec![6, 7];
        truncate_longest_first(&mut a, &mut b, 4);
        assert_eq!(a, vec![1, 2]);
        assert_eq!(b, vec![6, 7]);
    }

    #[test]
    fn test_classifier_layout() {
        let enc = encoder(EncodingStyle::Classifier, 16);
        let ex  = NliExample::new(3, DatasetId::MnliTrain, "the cat sat", "the mat", 2);
        let s   = enc.encode(&ex).unwrap();
        let sp  = enc.special();

        assert_eq!(s.input_ids.len(), 16);
        assert_eq!(s.input_ids[0], sp.cls);
        assert_eq!(s.input_ids[4], sp.sep);
        assert_eq!(s.input_ids[7], sp.sep);
        assert_eq!(&s.token_type_ids[..8], &[0, 0, 0, 0, 0, 1, 1, 1]);
        assert_eq!(s.attention_mask.iter().sum::<u32>(), 8);
        assert_eq!(s.label, 2);
        assert_eq!(s.heuristic, NO_HEURISTIC);
    }

    #[test]
    fn test_generative_targets_are_distinct_and_padded() {
        let enc = encoder(EncodingStyle::Generative, 32);
        let targets = enc.label_targets();
        assert_eq!(targets.len(), 3);
        assert!(targets.iter().all(|t| t.len() == LABEL_PAD_LENGTH));
        assert_ne!(targets[0], targets[1]);
        assert_ne!(targets[1], targets[2]);

        let ex = NliExample::new(0, DatasetId::MnliTrain, "the cat", "the mat", 1);
        let s  = enc.encode(&ex).unwrap();
        assert_eq!(s.target_ids, targets[1]);
        assert!(s.input_ids.contains(&enc.special().eos));
    }
}
