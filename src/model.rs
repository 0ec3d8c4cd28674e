use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct InputFileStamp {
    pub path: String,
    pub present: bool,
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorpusCounts {
    pub task_count: usize,
    pub request_count: usize,
    pub task_hint_doc_count: usize,
    pub request_hint_doc_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct JudgmentCounts {
    pub judgment_count: usize,
    pub judged_request_count: usize,
    pub request_relevant_count: usize,
    pub task_relevant_count: usize,
    pub not_relevant_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolutionSummary {
    pub solution: String,
    pub run_file: InputFileStamp,
    pub answered_request_count: usize,
    pub hit_count: usize,
    pub unknown_request_ids: Vec<String>,
    pub hint_docs_total: usize,
    pub hint_docs_found: usize,
    pub hint_doc_coverage: Option<f64>,
    pub request_ndcg_report_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub task_file: InputFileStamp,
    pub judgment_file: InputFileStamp,
    pub result_set_sizes: Vec<usize>,
    pub corpus: CorpusCounts,
    pub judgments: JudgmentCounts,
    pub solutions: Vec<SolutionSummary>,
    pub comparison_report_path: String,
    pub ndcg_summary_path: String,
}
