// src/tally.rs
//
// Reduces the registry into the per-mode result returned when a question stops.

use serde::Serialize;

use crate::question::QuestionMode;
use crate::registry::DeviceRegistry;

/// Question result. Serializes to `{"yes","no"}`, `{"a","b","c","d"}` or `{}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Tally {
    TwoChoice { yes: u32, no: u32 },
    MultipleChoice { a: u32, b: u32, c: u32, d: u32 },
    /// No question was ever started
    Empty {},
}

impl Tally {
    pub fn compute(mode: QuestionMode, registry: &DeviceRegistry) -> Tally {
        let answers = registry.iter().filter_map(|slot| slot.value);

        match mode {
            QuestionMode::TwoChoice => {
                let (mut yes, mut no) = (0, 0);
                for value in answers {
                    // yes takes the recorded value, no takes its negation
                    yes += u32::from(value);
                    no += u32::from(value == 0);
                }
                Tally::TwoChoice { yes, no }
            }
            QuestionMode::MultipleChoice => {
                let mut buckets = [0u32; 4];
                for value in answers {
                    if let Some(bucket) = buckets.get_mut(value as usize) {
                        *bucket += 1;
                    }
                }
                let [a, b, c, d] = buckets;
                Tally::MultipleChoice { a, b, c, d }
            }
            QuestionMode::None => Tally::Empty {},
        }
    }

    /// Number of answers counted
    pub fn total(&self) -> u32 {
        match self {
            Tally::TwoChoice { yes, no } => yes + no,
            Tally::MultipleChoice { a, b, c, d } => a + b + c + d,
            Tally::Empty {} => 0,
        }
    }
}
