use anyhow::{Result, bail};
use tracing::info;

use crate::cli::InspectArgs;
use crate::corpus::TaskCorpus;
use crate::judgments::{GoldPolicy, JudgmentStore};

pub fn run(args: InspectArgs) -> Result<()> {
    let mut corpus = TaskCorpus::load(&args.task_file)?;
    corpus.fix_task_docs();

    let judgments = match &args.qrel_file {
        Some(path) => JudgmentStore::load(path)?,
        None => JudgmentStore::default(),
    };

    info!(
        tasks = corpus.task_count(),
        requests = corpus.request_count(),
        task_hint_docs = corpus.task_hint_doc_count(),
        request_hint_docs = corpus.request_hint_doc_count(),
        judgments = judgments.len(),
        "task corpus loaded"
    );

    if let Some(request_id) = &args.request {
        return inspect_request(&corpus, &judgments, request_id);
    }

    for task in corpus.tasks() {
        info!(
            task = %task.id,
            title = %task.title,
            requests = task.requests.len(),
            hint_docs = task.hint_docs.len(),
            "task"
        );
        for request in &task.requests {
            info!(
                request = %request.id,
                text = %request.text,
                hint_docs = request.hint_docs.len(),
                judged = judgments.has_judgments(&request.id),
                positive_judgments = judgments.positive_judgments(&request.id).len(),
                "request"
            );
        }
    }

    let orphaned: Vec<&str> = judgments
        .judged_request_ids()
        .into_iter()
        .filter(|request_id| !corpus.contains_request(request_id))
        .collect();
    if !orphaned.is_empty() {
        info!(
            count = orphaned.len(),
            requests = ?orphaned,
            "judged requests not present in the task corpus"
        );
    }

    Ok(())
}

fn inspect_request(
    corpus: &TaskCorpus,
    judgments: &JudgmentStore,
    request_id: &str,
) -> Result<()> {
    let Some((task, request)) = corpus.find_request(request_id) else {
        bail!("request not found in task corpus: {request_id}");
    };

    info!(
        request = %request.id,
        task = %task.id,
        text = %request.text,
        "request detail"
    );
    info!(
        task = %task.id,
        title = %task.title,
        statement = %task.statement,
        narrative = %task.narrative,
        in_scope = %task.in_scope,
        "owning task"
    );
    info!(
        request_hint_docs = request.hint_docs.len(),
        task_hint_docs = task.hint_docs.len(),
        extractions = request.extractions.len(),
        "hint docs"
    );

    let narrow = corpus.relevant_docids(judgments, request_id, GoldPolicy::RequestOnly);
    let broad = corpus.relevant_docids(judgments, request_id, GoldPolicy::TaskOrRequest);
    info!(
        positive_judgments = judgments.positive_judgments(request_id).len(),
        request_only_gold = narrow.len(),
        task_or_request_gold = broad.len(),
        "gold sets"
    );

    for (doc_id, judgment) in judgments.request_judgments(request_id) {
        info!(
            doc = %doc_id,
            grade = judgment.grade.as_str(),
            annotator = judgment.annotator.as_deref().unwrap_or("-"),
            judged_at = judgment.judged_at.as_deref().unwrap_or("-"),
            "judgment"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::run;
    use crate::cli::InspectArgs;

    const TASK_JSON: &str = r#"
    [
      {
        "task-num": "T-01",
        "task-title": "Flooding",
        "task-docs": ["doc-t1"],
        "requests": [
          { "req-num": "T-01-R-01", "req-text": "levee failures", "req-docs": ["doc-r1"] }
        ]
      }
    ]
    "#;

    fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("fixture should write");
        path
    }

    #[test]
    fn inspect_summarizes_corpus() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let task_file = write_fixture(dir.path(), "tasks.json", TASK_JSON);

        let args = InspectArgs {
            task_file,
            qrel_file: None,
            request: None,
        };
        run(args).expect("inspect should succeed");
    }

    #[test]
    fn inspect_reports_request_detail_with_judgments() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let task_file = write_fixture(dir.path(), "tasks.json", TASK_JSON);
        let qrel_file = write_fixture(dir.path(), "qrels.txt", "T-01-R-01 doc-a 1\n");

        let args = InspectArgs {
            task_file,
            qrel_file: Some(qrel_file),
            request: Some("T-01-R-01".to_string()),
        };
        run(args).expect("inspect should succeed");
    }

    #[test]
    fn inspect_fails_for_unknown_request() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let task_file = write_fixture(dir.path(), "tasks.json", TASK_JSON);

        let args = InspectArgs {
            task_file,
            qrel_file: None,
            request: Some("NO-SUCH-REQUEST".to_string()),
        };
        let err = run(args).expect_err("unknown request should fail");
        assert!(err.to_string().contains("request not found"));
    }
}
