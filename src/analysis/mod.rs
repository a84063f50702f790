//! Result analysis -- per-dimension latency statistics and plain-text
//! recommendations derived from a finished campaign's case results.

use crate::engine::CaseResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Latency statistics for one value of a sweep dimension, computed over
/// successful cases only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionStats {
    pub avg_secs: f64,
    pub min_secs: f64,
    pub max_secs: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub execution_id: Uuid,
    pub total_cases: u32,
    pub successful_cases: u32,
    pub success_rate: f64,
    pub by_model: BTreeMap<String, DimensionStats>,
    pub by_user_type: BTreeMap<String, DimensionStats>,
    pub by_think_mode: BTreeMap<String, DimensionStats>,
    pub recommendations: Vec<String>,
}

fn stats_by<F>(results: &[CaseResult], key: F) -> BTreeMap<String, DimensionStats>
where
    F: Fn(&CaseResult) -> String,
{
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for r in results.iter().filter(|r| r.success) {
        grouped.entry(key(r)).or_default().push(r.elapsed_secs);
    }

    grouped
        .into_iter()
        .map(|(k, samples)| {
            let count = samples.len() as u32;
            let sum: f64 = samples.iter().sum();
            let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            (
                k,
                DimensionStats {
                    avg_secs: sum / count as f64,
                    min_secs: min,
                    max_secs: max,
                    count,
                },
            )
        })
        .collect()
}

fn fastest(stats: &BTreeMap<String, DimensionStats>) -> Option<(&String, &DimensionStats)> {
    stats
        .iter()
        .min_by(|a, b| a.1.avg_secs.total_cmp(&b.1.avg_secs))
}

/// Analyze a campaign's case results.
pub fn analyze(execution_id: Uuid, results: &[CaseResult]) -> Analysis {
    let total_cases = results.len() as u32;
    let successful_cases = results.iter().filter(|r| r.success).count() as u32;
    let success_rate = if total_cases > 0 {
        successful_cases as f64 / total_cases as f64
    } else {
        0.0
    };

    let by_model = stats_by(results, |r| r.case.model.clone());
    let by_user_type = stats_by(results, |r| r.case.user_type.clone());
    let by_think_mode = stats_by(results, |r| {
        if r.case.think_mode { "enabled" } else { "disabled" }.to_string()
    });

    let mut recommendations = Vec::new();

    if let Some((model, stats)) = fastest(&by_model) {
        if by_model.len() > 1 {
            recommendations.push(format!(
                "Fastest model: {} (avg {:.1}s per case)",
                model, stats.avg_secs
            ));
        }
    }

    if let Some((user_type, stats)) = fastest(&by_user_type) {
        if by_user_type.len() > 1 {
            recommendations.push(format!(
                "Fastest response style: {} (avg {:.1}s per case)",
                user_type, stats.avg_secs
            ));
        }
    }

    if let (Some(on), Some(off)) = (by_think_mode.get("enabled"), by_think_mode.get("disabled")) {
        let delta = on.avg_secs - off.avg_secs;
        if delta > 0.0 {
            recommendations.push(format!(
                "Think mode adds {:.1}s per case on average",
                delta
            ));
        } else {
            recommendations.push(
                "Think mode shows no measurable latency cost in this campaign".to_string(),
            );
        }
    }

    if total_cases > 0 && success_rate < 0.9 {
        recommendations.push(format!(
            "Success rate is {:.0}% -- inspect failed cases before trusting the latency numbers",
            success_rate * 100.0
        ));
    }

    Analysis {
        execution_id,
        total_cases,
        successful_cases,
        success_rate,
        by_model,
        by_user_type,
        by_think_mode,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sweep::TestCase;
    use chrono::Utc;

    fn result(model: &str, user_type: &str, think: bool, elapsed: f64, ok: bool) -> CaseResult {
        CaseResult {
            case: TestCase {
                model: model.to_string(),
                user_type: user_type.to_string(),
                think_mode: think,
                question: "q".to_string(),
                iteration: 0,
            },
            response: if ok { "r".to_string() } else { String::new() },
            elapsed_secs: elapsed,
            success: ok,
            error: if ok { None } else { Some("err".to_string()) },
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_stats_cover_successful_cases_only() {
        let results = vec![
            result("model-a", "business", false, 2.0, true),
            result("model-a", "business", false, 4.0, true),
            result("model-a", "business", false, 99.0, false),
        ];
        let analysis = analyze(Uuid::new_v4(), &results);

        assert_eq!(analysis.total_cases, 3);
        assert_eq!(analysis.successful_cases, 2);
        let stats = &analysis.by_model["model-a"];
        assert_eq!(stats.count, 2);
        assert!((stats.avg_secs - 3.0).abs() < f64::EPSILON);
        assert_eq!(stats.min_secs, 2.0);
        assert_eq!(stats.max_secs, 4.0);
    }

    #[test]
    fn test_fastest_model_recommendation() {
        let results = vec![
            result("model-a", "business", false, 1.0, true),
            result("model-b", "business", false, 5.0, true),
        ];
        let analysis = analyze(Uuid::new_v4(), &results);
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.contains("Fastest model: model-a")));
    }

    #[test]
    fn test_think_mode_delta_recommendation() {
        let results = vec![
            result("model-a", "business", true, 10.0, true),
            result("model-a", "business", false, 4.0, true),
        ];
        let analysis = analyze(Uuid::new_v4(), &results);
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.contains("Think mode adds 6.0s")));
        assert_eq!(analysis.by_think_mode["enabled"].count, 1);
    }

    #[test]
    fn test_low_success_rate_flagged() {
        let results = vec![
            result("model-a", "business", false, 1.0, true),
            result("model-a", "business", false, 1.0, false),
        ];
        let analysis = analyze(Uuid::new_v4(), &results);
        assert!((analysis.success_rate - 0.5).abs() < f64::EPSILON);
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.contains("Success rate is 50%")));
    }

    #[test]
    fn test_empty_results() {
        let analysis = analyze(Uuid::new_v4(), &[]);
        assert_eq!(analysis.total_cases, 0);
        assert_eq!(analysis.success_rate, 0.0);
        assert!(analysis.by_model.is_empty());
    }
}
