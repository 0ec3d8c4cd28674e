use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::aggregate::{self, Averaging};
use crate::cli::EvaluateArgs;
use crate::corpus::TaskCorpus;
use crate::judgments::{GoldPolicy, JudgmentStore, RelevanceGrade};
use crate::metrics::{self, PolicyMetrics, TaskMetrics, TaskNdcg};
use crate::model::{
    CorpusCounts, EvaluationManifest, InputFileStamp, JudgmentCounts, SolutionSummary,
};
use crate::report::{
    ComparisonRow, NdcgSummaryRow, RequestNdcgRow, solution_file_label, write_comparison_report,
    write_ndcg_summary, write_request_ndcg_report,
};
use crate::runs::RunIndex;
use crate::util::{ensure_directory, now_utc_string, sha256_file, write_json_pretty};

const DEFAULT_RESULT_SET_SIZE: usize = 1000;
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub label: String,
    pub path: PathBuf,
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let run_specs = parse_run_specs(&args.runs)?;
    let depths = resolve_depths(&args.depths)?;

    let mut corpus = TaskCorpus::load(&args.task_file)?;
    corpus.fix_task_docs();
    let judgments = JudgmentStore::load(&args.qrel_file)?;
    if judgments.is_empty() {
        warn!("no relevance judgments loaded; graded metrics will be non-evaluable");
    }

    info!(
        tasks = corpus.task_count(),
        requests = corpus.request_count(),
        judgments = judgments.len(),
        solutions = run_specs.len(),
        "evaluation inputs loaded"
    );

    ensure_directory(&args.output_dir)?;
    let comparison_path = args
        .comparison_report_path
        .unwrap_or_else(|| args.output_dir.join("comparison.csv"));
    let ndcg_summary_path = args
        .ndcg_summary_path
        .unwrap_or_else(|| args.output_dir.join("ndcg_summary.csv"));

    let mut comparison_rows = Vec::new();
    let mut ndcg_summary_rows = Vec::new();
    let mut solution_summaries = Vec::new();

    for spec in &run_specs {
        let runs = RunIndex::load(&spec.path)?;
        info!(
            solution = %spec.label,
            requests = runs.request_count(),
            hits = runs.hit_count(),
            "run file loaded"
        );
        if runs.is_empty() {
            warn!(solution = %spec.label, "run file contains no result rows");
        }

        let unknown_requests = unknown_request_ids(&corpus, &runs);
        if !unknown_requests.is_empty() {
            warn!(
                solution = %spec.label,
                count = unknown_requests.len(),
                "run file answers requests that are not in the task corpus"
            );
        }

        for depth in &depths {
            let task_metrics = metrics::evaluate_at_depth(&corpus, &judgments, &runs, *depth);
            for policy in GoldPolicy::ALL {
                for method in Averaging::ALL {
                    comparison_rows.push(comparison_row(
                        &spec.label,
                        policy,
                        method,
                        *depth,
                        &task_metrics,
                    ));
                }
            }
        }

        let ndcg_tasks = metrics::evaluate_ndcg(&corpus, &judgments, &runs);
        for method in Averaging::ALL {
            ndcg_summary_rows.push(NdcgSummaryRow {
                solution: spec.label.clone(),
                averaging: method.label(),
                ndcg: aggregate::average(method, &ndcg_groups(&ndcg_tasks)),
            });
        }

        let request_report_path = args.output_dir.join(format!(
            "ndcg_requests.{}.csv",
            solution_file_label(&spec.label)
        ));
        write_per_request_ndcg(&request_report_path, &ndcg_tasks)?;
        info!(
            solution = %spec.label,
            path = %request_report_path.display(),
            "wrote per-request ndcg report"
        );

        solution_summaries.push(solution_summary(
            spec,
            &corpus,
            &runs,
            unknown_requests,
            &request_report_path,
        )?);
    }

    write_comparison_report(&comparison_path, &comparison_rows)?;
    info!(
        path = %comparison_path.display(),
        rows = comparison_rows.len(),
        "wrote comparison report"
    );

    write_ndcg_summary(&ndcg_summary_path, &ndcg_summary_rows)?;
    info!(
        path = %ndcg_summary_path.display(),
        rows = ndcg_summary_rows.len(),
        "wrote ndcg summary"
    );

    let manifest = EvaluationManifest {
        manifest_version: MANIFEST_VERSION,
        generated_at: now_utc_string(),
        task_file: stamp_input(&args.task_file)?,
        judgment_file: stamp_input(&args.qrel_file)?,
        result_set_sizes: depths,
        corpus: CorpusCounts {
            task_count: corpus.task_count(),
            request_count: corpus.request_count(),
            task_hint_doc_count: corpus.task_hint_doc_count(),
            request_hint_doc_count: corpus.request_hint_doc_count(),
        },
        judgments: judgment_counts(&judgments),
        solutions: solution_summaries,
        comparison_report_path: comparison_path.display().to_string(),
        ndcg_summary_path: ndcg_summary_path.display().to_string(),
    };

    let manifest_path = args.output_dir.join("evaluation_manifest.json");
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote evaluation manifest");

    Ok(())
}

fn parse_run_specs(raw_specs: &[String]) -> Result<Vec<RunSpec>> {
    if raw_specs.is_empty() {
        bail!("at least one --run LABEL=PATH (or --run PATH) is required");
    }

    let mut specs = Vec::with_capacity(raw_specs.len());
    let mut seen_labels = BTreeSet::new();
    let mut seen_file_labels: BTreeMap<String, String> = BTreeMap::new();
    for raw in raw_specs {
        let spec = parse_run_spec(raw)?;
        if !seen_labels.insert(spec.label.clone()) {
            bail!("duplicate run label: {}", spec.label);
        }
        let file_label = solution_file_label(&spec.label);
        if let Some(existing) = seen_file_labels.insert(file_label.clone(), spec.label.clone()) {
            bail!(
                "run labels '{existing}' and '{}' map to the same report file name '{file_label}'",
                spec.label
            );
        }
        specs.push(spec);
    }
    Ok(specs)
}

fn parse_run_spec(raw: &str) -> Result<RunSpec> {
    if let Some((label, path)) = raw.split_once('=') {
        let label = label.trim();
        let path = path.trim();
        if label.is_empty() || path.is_empty() {
            bail!("run spec '{raw}' must look like LABEL=PATH");
        }
        return Ok(RunSpec {
            label: label.to_string(),
            path: PathBuf::from(path),
        });
    }

    let path = PathBuf::from(raw.trim());
    let label = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("cannot derive a run label from path: {raw}"))?;
    Ok(RunSpec { label, path })
}

fn resolve_depths(requested: &[usize]) -> Result<Vec<usize>> {
    if requested.iter().any(|depth| *depth == 0) {
        bail!("--depth must be a positive number of documents");
    }

    let mut depths: Vec<usize> = if requested.is_empty() {
        vec![DEFAULT_RESULT_SET_SIZE]
    } else {
        requested.to_vec()
    };
    depths.sort_unstable();
    depths.dedup();
    Ok(depths)
}

fn comparison_row(
    solution: &str,
    policy: GoldPolicy,
    method: Averaging,
    depth: usize,
    tasks: &[TaskMetrics],
) -> ComparisonRow {
    ComparisonRow {
        solution: solution.to_string(),
        judgment_set: policy.label(),
        averaging: method.label(),
        result_set_size: depth,
        recall: aggregate_metric(tasks, policy, method, |metrics| metrics.recall),
        precision: aggregate_metric(tasks, policy, method, |metrics| metrics.precision),
        r_precision: aggregate_metric(tasks, policy, method, |metrics| metrics.r_precision),
        unjudged: aggregate_metric(tasks, policy, method, |metrics| metrics.unjudged),
    }
}

fn aggregate_metric<F>(
    tasks: &[TaskMetrics],
    policy: GoldPolicy,
    method: Averaging,
    select: F,
) -> Option<f64>
where
    F: Fn(&PolicyMetrics) -> Option<f64>,
{
    let groups: Vec<Vec<Option<f64>>> = tasks
        .iter()
        .map(|task| {
            task.requests
                .iter()
                .map(|request| select(request.policy(policy)))
                .collect()
        })
        .collect();
    aggregate::average(method, &groups)
}

fn ndcg_groups(tasks: &[TaskNdcg]) -> Vec<Vec<Option<f64>>> {
    tasks
        .iter()
        .map(|task| task.requests.iter().map(|request| request.ndcg).collect())
        .collect()
}

fn write_per_request_ndcg(path: &Path, tasks: &[TaskNdcg]) -> Result<()> {
    let rows: Vec<RequestNdcgRow> = tasks
        .iter()
        .flat_map(|task| task.requests.iter())
        .filter_map(|request| {
            request.ndcg.map(|ndcg| RequestNdcgRow {
                request_id: request.request_id.clone(),
                ndcg,
            })
        })
        .collect();
    let total = aggregate::micro_average(&ndcg_groups(tasks));
    write_request_ndcg_report(path, &rows, total)
}

fn unknown_request_ids(corpus: &TaskCorpus, runs: &RunIndex) -> Vec<String> {
    runs.request_ids()
        .into_iter()
        .filter(|request_id| !corpus.contains_request(request_id))
        .map(ToOwned::to_owned)
        .collect()
}

fn solution_summary(
    spec: &RunSpec,
    corpus: &TaskCorpus,
    runs: &RunIndex,
    unknown_request_ids: Vec<String>,
    request_ndcg_report_path: &Path,
) -> Result<SolutionSummary> {
    let answered_request_count = runs
        .request_ids()
        .into_iter()
        .filter(|request_id| corpus.contains_request(request_id))
        .count();
    let coverage = metrics::hint_coverage(corpus, runs);

    Ok(SolutionSummary {
        solution: spec.label.clone(),
        run_file: stamp_input(&spec.path)?,
        answered_request_count,
        hit_count: runs.hit_count(),
        unknown_request_ids,
        hint_docs_total: coverage.hint_docs_total,
        hint_docs_found: coverage.hint_docs_found,
        hint_doc_coverage: coverage.fraction(),
        request_ndcg_report_path: request_ndcg_report_path.display().to_string(),
    })
}

fn stamp_input(path: &Path) -> Result<InputFileStamp> {
    let present = path.is_file();
    let sha256 = if present {
        Some(sha256_file(path)?)
    } else {
        None
    };
    Ok(InputFileStamp {
        path: path.display().to_string(),
        present,
        sha256,
    })
}

fn judgment_counts(judgments: &JudgmentStore) -> JudgmentCounts {
    JudgmentCounts {
        judgment_count: judgments.len(),
        judged_request_count: judgments.request_count(),
        request_relevant_count: judgments.grade_count(RelevanceGrade::RequestRelevant),
        task_relevant_count: judgments.grade_count(RelevanceGrade::TaskRelevant),
        not_relevant_count: judgments.grade_count(RelevanceGrade::NotRelevant),
    }
}
