//! Config expansion -- turn a sweep spec into an ordered list of test cases.

use super::TestCase;
use crate::config::{ModelCatalog, SweepConfig};
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Expand a sweep config into the full ordered case list.
///
/// Think-mode combinations are skipped for models whose catalog entry does
/// not grant the capability. Each retained combination is replicated
/// `iterations` times. Shuffling is an explicit step applied after
/// generation and is deterministic when `config.seed` is set.
pub fn expand(config: &SweepConfig, catalog: &ModelCatalog) -> Result<Vec<TestCase>> {
    config.validate()?;

    let mut rng = seeded_rng(config.seed);

    // Large sweeps can cap how many questions each combination sees.
    let questions: Vec<&String> = match config.questions_per_combination {
        Some(cap) if cap < config.questions.len() => {
            if cap == 0 {
                return Err(Error::InvalidConfiguration(
                    "questions_per_combination must be >= 1".to_string(),
                ));
            }
            config
                .questions
                .choose_multiple(&mut rng, cap)
                .collect()
        }
        _ => config.questions.iter().collect(),
    };

    let mut cases = Vec::new();
    for model in &config.models {
        for user_type in &config.user_types {
            for &think_mode in &config.think_mode_options {
                if think_mode && !catalog.supports_think_mode(model) {
                    continue;
                }
                for question in &questions {
                    for iteration in 0..config.iterations {
                        cases.push(TestCase {
                            model: model.clone(),
                            user_type: user_type.clone(),
                            think_mode,
                            question: (*question).clone(),
                            iteration,
                        });
                    }
                }
            }
        }
    }

    if config.shuffle {
        cases.shuffle(&mut rng);
    }

    Ok(cases)
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}
