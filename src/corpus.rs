use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::judgments::{GoldPolicy, JudgmentStore};

#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "task-num")]
    pub task_num: String,
    #[serde(rename = "task-title", default)]
    pub task_title: Option<String>,
    #[serde(rename = "task-stmt", default)]
    pub task_stmt: Option<String>,
    #[serde(rename = "task-narr", default)]
    pub task_narr: Option<String>,
    #[serde(rename = "task-in-scope", default)]
    pub task_in_scope: Option<String>,
    #[serde(rename = "task-docs", default)]
    pub task_docs: Vec<String>,
    #[serde(default)]
    pub requests: Vec<RequestRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestRecord {
    #[serde(rename = "req-num")]
    pub req_num: String,
    #[serde(rename = "req-text", default)]
    pub req_text: Option<String>,
    #[serde(rename = "req-docs", default)]
    pub req_docs: Vec<String>,
    #[serde(rename = "req-extr", default)]
    pub req_extr: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub id: String,
    pub text: String,
    pub hint_docs: BTreeSet<String>,
    pub extractions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub statement: String,
    pub narrative: String,
    pub in_scope: String,
    pub hint_docs: BTreeSet<String>,
    pub requests: Vec<Request>,
}

#[derive(Debug, Default)]
pub struct TaskCorpus {
    tasks: Vec<Task>,
}

#[derive(Debug)]
pub struct RequestGroup<'a> {
    pub task_id: &'a str,
    pub request_ids: Vec<&'a str>,
}

impl TaskCorpus {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read task file: {}", path.display()))?;
        let records: Vec<TaskRecord> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse task file: {}", path.display()))?;
        TaskCorpus::from_records(records)
            .with_context(|| format!("invalid task file: {}", path.display()))
    }

    pub fn from_records(records: Vec<TaskRecord>) -> Result<Self> {
        let mut tasks = Vec::with_capacity(records.len());
        let mut seen_task_ids = BTreeSet::new();
        let mut seen_request_ids = BTreeSet::new();

        for record in records {
            if record.task_num.trim().is_empty() {
                bail!("task with empty task-num");
            }
            if !seen_task_ids.insert(record.task_num.clone()) {
                bail!("duplicate task id: {}", record.task_num);
            }

            let mut requests = Vec::with_capacity(record.requests.len());
            for request in record.requests {
                if request.req_num.trim().is_empty() {
                    bail!("request with empty req-num in task {}", record.task_num);
                }
                if !seen_request_ids.insert(request.req_num.clone()) {
                    bail!("duplicate request id: {}", request.req_num);
                }

                requests.push(Request {
                    id: request.req_num,
                    text: request.req_text.unwrap_or_default(),
                    hint_docs: request.req_docs.into_iter().collect(),
                    extractions: request.req_extr,
                });
            }

            tasks.push(Task {
                id: record.task_num,
                title: record.task_title.unwrap_or_default(),
                statement: record.task_stmt.unwrap_or_default(),
                narrative: record.task_narr.unwrap_or_default(),
                in_scope: record.task_in_scope.unwrap_or_default(),
                hint_docs: record.task_docs.into_iter().collect(),
                requests,
            });
        }

        Ok(TaskCorpus { tasks })
    }

    pub fn fix_task_docs(&mut self) {
        for task in &mut self.tasks {
            let Task {
                hint_docs,
                requests,
                ..
            } = task;
            for request in requests.iter() {
                hint_docs.extend(request.hint_docs.iter().cloned());
            }
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn request_count(&self) -> usize {
        self.tasks.iter().map(|task| task.requests.len()).sum()
    }

    pub fn task_hint_doc_count(&self) -> usize {
        self.tasks.iter().map(|task| task.hint_docs.len()).sum()
    }

    pub fn request_hint_doc_count(&self) -> usize {
        self.tasks
            .iter()
            .flat_map(|task| task.requests.iter())
            .map(|request| request.hint_docs.len())
            .sum()
    }

    pub fn request_groups(&self) -> Vec<RequestGroup<'_>> {
        self.tasks
            .iter()
            .map(|task| RequestGroup {
                task_id: task.id.as_str(),
                request_ids: task
                    .requests
                    .iter()
                    .map(|request| request.id.as_str())
                    .collect(),
            })
            .collect()
    }

    pub fn find_request(&self, request_id: &str) -> Option<(&Task, &Request)> {
        for task in &self.tasks {
            if let Some(request) = task.requests.iter().find(|request| request.id == request_id) {
                return Some((task, request));
            }
        }
        None
    }

    pub fn contains_request(&self, request_id: &str) -> bool {
        self.find_request(request_id).is_some()
    }

    pub fn relevant_docids(
        &self,
        judgments: &JudgmentStore,
        request_id: &str,
        policy: GoldPolicy,
    ) -> BTreeSet<String> {
        let mut gold = judgments.relevant_docids(request_id, policy);
        if policy == GoldPolicy::TaskOrRequest
            && let Some((task, _)) = self.find_request(request_id)
        {
            gold.extend(task.hint_docs.iter().cloned());
        }
        gold
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskCorpus, TaskRecord};
    use crate::judgments::{GoldPolicy, JudgmentStore};

    const TASK_JSON: &str = r#"
    [
      {
        "task-num": "T-01",
        "task-title": "Flood response",
        "task-stmt": "Track flood impact on river towns",
        "task-narr": "Reports about flooding and mitigation",
        "task-in-scope": "true",
        "task-docs": ["doc-t1"],
        "requests": [
          {
            "req-num": "T-01-R-01",
            "req-text": "dikes and levees",
            "req-docs": ["doc-r1", "doc-r2"],
            "req-extr": ["the levee failed overnight"]
          },
          {
            "req-num": "T-01-R-02",
            "req-text": "evacuations",
            "req-docs": []
          }
        ]
      },
      {
        "task-num": "T-02",
        "task-docs": [],
        "requests": [
          { "req-num": "T-02-R-01", "req-text": "aftershocks", "req-docs": ["doc-q1"] }
        ]
      }
    ]
    "#;

    fn fixture_corpus() -> TaskCorpus {
        let records: Vec<TaskRecord> =
            serde_json::from_str(TASK_JSON).expect("fixture should deserialize");
        TaskCorpus::from_records(records).expect("fixture should build")
    }

    fn task_by_id<'a>(corpus: &'a TaskCorpus, task_id: &str) -> &'a Task {
        corpus
            .tasks()
            .iter()
            .find(|task| task.id == task_id)
            .expect("task should exist")
    }

    #[test]
    fn builds_task_tree_from_records() {
        let corpus = fixture_corpus();
        assert_eq!(corpus.task_count(), 2);
        assert_eq!(corpus.request_count(), 3);

        let (task, request) = corpus.find_request("T-01-R-01").expect("request should exist");
        assert_eq!(task.id, "T-01");
        assert_eq!(request.text, "dikes and levees");
        assert_eq!(request.hint_docs.len(), 2);
        assert_eq!(request.extractions.len(), 1);
    }

    #[test]
    fn missing_optional_fields_default_to_empty() {
        let corpus = fixture_corpus();
        let task = task_by_id(&corpus, "T-02");
        assert!(task.title.is_empty());
        assert!(task.narrative.is_empty());
        assert!(task.hint_docs.is_empty());
    }

    #[test]
    fn fix_task_docs_unions_request_hints_into_tasks() {
        let mut corpus = fixture_corpus();
        assert_eq!(task_by_id(&corpus, "T-01").hint_docs.len(), 1);

        corpus.fix_task_docs();

        let task = task_by_id(&corpus, "T-01");
        for doc in ["doc-t1", "doc-r1", "doc-r2"] {
            assert!(task.hint_docs.contains(doc), "missing {doc}");
        }
        assert_eq!(task.hint_docs.len(), 3);
    }

    #[test]
    fn fix_task_docs_is_idempotent() {
        let mut corpus = fixture_corpus();
        corpus.fix_task_docs();
        let before = task_by_id(&corpus, "T-01").hint_docs.clone();

        corpus.fix_task_docs();
        assert_eq!(task_by_id(&corpus, "T-01").hint_docs, before);
    }

    #[test]
    fn every_request_hint_set_is_contained_after_normalization() {
        let mut corpus = fixture_corpus();
        corpus.fix_task_docs();

        for task in corpus.tasks() {
            for request in &task.requests {
                assert!(request.hint_docs.is_subset(&task.hint_docs));
            }
        }
    }

    #[test]
    fn request_groups_follow_corpus_order() {
        let corpus = fixture_corpus();
        let groups = corpus.request_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].task_id, "T-01");
        assert_eq!(groups[0].request_ids, vec!["T-01-R-01", "T-01-R-02"]);
        assert_eq!(groups[1].task_id, "T-02");
        assert_eq!(groups[1].request_ids, vec!["T-02-R-01"]);
    }

    #[test]
    fn duplicate_request_ids_are_rejected() {
        let raw = r#"[
          { "task-num": "T-01", "requests": [{ "req-num": "R-1" }, { "req-num": "R-1" }] }
        ]"#;
        let records: Vec<TaskRecord> =
            serde_json::from_str(raw).expect("fixture should deserialize");
        let err =
            TaskCorpus::from_records(records).expect_err("duplicate req-num should be rejected");
        assert!(err.to_string().contains("duplicate request id"));
    }

    #[test]
    fn duplicate_task_ids_are_rejected() {
        let raw = r#"[
          { "task-num": "T-01", "requests": [] },
          { "task-num": "T-01", "requests": [] }
        ]"#;
        let records: Vec<TaskRecord> =
            serde_json::from_str(raw).expect("fixture should deserialize");
        let err =
            TaskCorpus::from_records(records).expect_err("duplicate task-num should be rejected");
        assert!(err.to_string().contains("duplicate task id"));
    }

    #[test]
    fn gold_set_policies_differ_on_hint_docs() {
        let mut corpus = fixture_corpus();
        corpus.fix_task_docs();

        let judgments = JudgmentStore::parse(
            "T-01-R-01 doc-j1 1\nT-01-R-01 doc-j2 2\nT-01-R-01 doc-j3 3\n",
        )
        .expect("qrels should parse");

        let narrow = corpus.relevant_docids(&judgments, "T-01-R-01", GoldPolicy::RequestOnly);
        assert_eq!(narrow.into_iter().collect::<Vec<_>>(), vec!["doc-j1"]);

        let broad = corpus.relevant_docids(&judgments, "T-01-R-01", GoldPolicy::TaskOrRequest);
        for doc in ["doc-j1", "doc-j2", "doc-t1", "doc-r1", "doc-r2"] {
            assert!(broad.contains(doc), "missing {doc}");
        }
        assert_eq!(broad.len(), 5);
    }
}
