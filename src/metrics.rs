use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::corpus::TaskCorpus;
use crate::judgments::{GoldPolicy, JudgmentStore};
use crate::runs::RunIndex;

#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyMetrics {
    pub recall: Option<f64>,
    pub precision: Option<f64>,
    pub r_precision: Option<f64>,
    pub unjudged: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub request_id: String,
    pub request_only: PolicyMetrics,
    pub task_or_request: PolicyMetrics,
}

impl RequestMetrics {
    pub fn policy(&self, policy: GoldPolicy) -> &PolicyMetrics {
        match policy {
            GoldPolicy::RequestOnly => &self.request_only,
            GoldPolicy::TaskOrRequest => &self.task_or_request,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskMetrics {
    pub task_id: String,
    pub requests: Vec<RequestMetrics>,
}

#[derive(Debug, Clone)]
pub struct RequestNdcg {
    pub request_id: String,
    pub ndcg: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TaskNdcg {
    pub task_id: String,
    pub requests: Vec<RequestNdcg>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HintCoverage {
    pub hint_docs_total: usize,
    pub hint_docs_found: usize,
}

impl HintCoverage {
    pub fn fraction(&self) -> Option<f64> {
        if self.hint_docs_total == 0 {
            None
        } else {
            Some(self.hint_docs_found as f64 / self.hint_docs_total as f64)
        }
    }
}

pub fn recall_percent(run_docids: &[String], gold: &BTreeSet<String>) -> Option<f64> {
    if run_docids.is_empty() || gold.is_empty() {
        return None;
    }
    let found = gold_matches(run_docids, gold);
    Some(found as f64 / gold.len() as f64 * 100.0)
}

pub fn precision_percent(run_docids: &[String], gold: &BTreeSet<String>) -> Option<f64> {
    if run_docids.is_empty() || gold.is_empty() {
        return None;
    }
    let found = gold_matches(run_docids, gold);
    Some(found as f64 / run_docids.len() as f64 * 100.0)
}

pub fn r_precision_percent(run_docids: &[String], gold: &BTreeSet<String>) -> Option<f64> {
    if run_docids.is_empty() || gold.is_empty() {
        return None;
    }
    let cutoff = gold.len().min(run_docids.len());
    let found = gold_matches(&run_docids[..cutoff], gold);
    Some(found as f64 / gold.len() as f64 * 100.0)
}

pub fn unjudged_percent(
    judgments: &JudgmentStore,
    request_id: &str,
    run_docids: &[String],
) -> Option<f64> {
    if run_docids.is_empty() {
        return None;
    }
    let unjudged = run_docids
        .iter()
        .filter(|doc_id| judgments.lookup(request_id, doc_id).is_none())
        .count();
    Some(unjudged as f64 / run_docids.len() as f64 * 100.0)
}

pub fn ndcg_at_r(
    judgments: &JudgmentStore,
    request_id: &str,
    run_docids: &[String],
) -> Option<f64> {
    if run_docids.is_empty() {
        return None;
    }

    let mut ideal_gains: Vec<f64> = judgments
        .positive_judgments(request_id)
        .iter()
        .map(|(_, grade)| f64::from(grade.gain()))
        .collect();
    if ideal_gains.is_empty() {
        return None;
    }
    ideal_gains.sort_by(|left, right| right.total_cmp(left));

    let cutoff = ideal_gains.len();
    let ideal: f64 = ideal_gains
        .iter()
        .enumerate()
        .map(|(index, gain)| discounted_gain(index + 1, *gain))
        .sum();
    let mut credited = HashSet::new();
    let observed: f64 = run_docids
        .iter()
        .take(cutoff)
        .enumerate()
        .map(|(index, doc_id)| {
            if credited.insert(doc_id.as_str()) {
                discounted_gain(index + 1, f64::from(judgments.gain_for(request_id, doc_id)))
            } else {
                0.0
            }
        })
        .sum();

    Some(observed / ideal)
}

fn discounted_gain(rank: usize, gain: f64) -> f64 {
    if rank == 1 {
        gain
    } else {
        gain / ((rank + 1) as f64).log2()
    }
}

fn gold_matches(run_docids: &[String], gold: &BTreeSet<String>) -> usize {
    let distinct: HashSet<&str> = run_docids.iter().map(String::as_str).collect();
    distinct
        .into_iter()
        .filter(|doc_id| gold.contains(*doc_id))
        .count()
}

pub fn evaluate_at_depth(
    corpus: &TaskCorpus,
    judgments: &JudgmentStore,
    runs: &RunIndex,
    depth: usize,
) -> Vec<TaskMetrics> {
    corpus
        .request_groups()
        .into_iter()
        .map(|group| {
            let requests = group
                .request_ids
                .iter()
                .copied()
                .map(|request_id| {
                    let run_docids = runs.docids(request_id, depth);
                    let request = RequestMetrics {
                        request_id: request_id.to_string(),
                        request_only: policy_metrics(
                            corpus,
                            judgments,
                            request_id,
                            run_docids,
                            GoldPolicy::RequestOnly,
                        ),
                        task_or_request: policy_metrics(
                            corpus,
                            judgments,
                            request_id,
                            run_docids,
                            GoldPolicy::TaskOrRequest,
                        ),
                    };
                    debug!(
                        request = %request.request_id,
                        recall_e1 = ?request.request_only.recall,
                        recall_e2 = ?request.task_or_request.recall,
                        "scored request"
                    );
                    request
                })
                .collect();

            let task = TaskMetrics {
                task_id: group.task_id.to_string(),
                requests,
            };
            debug!(
                task = %task.task_id,
                requests = task.requests.len(),
                depth,
                "scored task"
            );
            task
        })
        .collect()
}

fn policy_metrics(
    corpus: &TaskCorpus,
    judgments: &JudgmentStore,
    request_id: &str,
    run_docids: &[String],
    policy: GoldPolicy,
) -> PolicyMetrics {
    let gold = corpus.relevant_docids(judgments, request_id, policy);
    PolicyMetrics {
        recall: recall_percent(run_docids, &gold),
        precision: precision_percent(run_docids, &gold),
        r_precision: r_precision_percent(run_docids, &gold),
        unjudged: unjudged_percent(judgments, request_id, run_docids),
    }
}

pub fn evaluate_ndcg(
    corpus: &TaskCorpus,
    judgments: &JudgmentStore,
    runs: &RunIndex,
) -> Vec<TaskNdcg> {
    corpus
        .request_groups()
        .into_iter()
        .map(|group| {
            let requests = group
                .request_ids
                .iter()
                .copied()
                .map(|request_id| RequestNdcg {
                    request_id: request_id.to_string(),
                    ndcg: ndcg_at_r(judgments, request_id, runs.full_docids(request_id)),
                })
                .collect();

            let task = TaskNdcg {
                task_id: group.task_id.to_string(),
                requests,
            };
            debug!(task = %task.task_id, "computed ndcg for task");
            task
        })
        .collect()
}

pub fn hint_coverage(corpus: &TaskCorpus, runs: &RunIndex) -> HintCoverage {
    let mut coverage = HintCoverage::default();

    for task in corpus.tasks() {
        for request in &task.requests {
            let run_docids = runs.full_docids(&request.id);
            if run_docids.is_empty() {
                continue;
            }
            let returned: HashSet<&str> = run_docids.iter().map(String::as_str).collect();
            coverage.hint_docs_total += task.hint_docs.len();
            coverage.hint_docs_found += task
                .hint_docs
                .iter()
                .filter(|doc_id| returned.contains(doc_id.as_str()))
                .count();
        }
    }

    coverage
}
