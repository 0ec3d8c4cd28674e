use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelevanceGrade {
    RequestRelevant,
    TaskRelevant,
    NotRelevant,
}

impl RelevanceGrade {
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "1" => Ok(RelevanceGrade::RequestRelevant),
            "2" => Ok(RelevanceGrade::TaskRelevant),
            "3" => Ok(RelevanceGrade::NotRelevant),
            other => bail!("unknown relevance grade code: '{other}'"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelevanceGrade::RequestRelevant => "request-relevant",
            RelevanceGrade::TaskRelevant => "task-relevant",
            RelevanceGrade::NotRelevant => "not-relevant",
        }
    }

    pub fn gain(self) -> u32 {
        match self {
            RelevanceGrade::RequestRelevant => 2,
            RelevanceGrade::TaskRelevant => 1,
            RelevanceGrade::NotRelevant => 0,
        }
    }

    pub fn is_positive(self) -> bool {
        self.gain() > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoldPolicy {
    RequestOnly,
    TaskOrRequest,
}

impl GoldPolicy {
    pub const ALL: [GoldPolicy; 2] = [GoldPolicy::RequestOnly, GoldPolicy::TaskOrRequest];

    pub fn label(self) -> &'static str {
        match self {
            GoldPolicy::RequestOnly => "E1",
            GoldPolicy::TaskOrRequest => "E2",
        }
    }

    pub fn admits(self, grade: RelevanceGrade) -> bool {
        match self {
            GoldPolicy::RequestOnly => grade == RelevanceGrade::RequestRelevant,
            GoldPolicy::TaskOrRequest => grade.is_positive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceJudgment {
    pub grade: RelevanceGrade,
    pub annotator: Option<String>,
    pub judged_at: Option<String>,
}

#[derive(Debug, Default)]
pub struct JudgmentStore {
    by_request: BTreeMap<String, BTreeMap<String, RelevanceJudgment>>,
}

impl JudgmentStore {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "judgment file not found; continuing with an empty judgment store"
            );
            return Ok(JudgmentStore::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read judgment file: {}", path.display()))?;
        JudgmentStore::parse(&text)
            .with_context(|| format!("failed to parse judgment file: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut store = JudgmentStore::default();

        for (index, raw_line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            let (request_id, doc_id, judgment) = if line.contains(',') {
                parse_annotated_row(line, line_number)?
            } else {
                parse_plain_row(line, line_number)?
            };
            store.insert(request_id, doc_id, judgment);
        }

        Ok(store)
    }

    pub fn insert(&mut self, request_id: String, doc_id: String, judgment: RelevanceJudgment) {
        self.by_request
            .entry(request_id)
            .or_default()
            .insert(doc_id, judgment);
    }

    pub fn len(&self) -> usize {
        self.by_request.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_request.is_empty()
    }

    pub fn request_count(&self) -> usize {
        self.by_request.len()
    }

    pub fn grade_count(&self, grade: RelevanceGrade) -> usize {
        self.by_request
            .values()
            .flat_map(BTreeMap::values)
            .filter(|judgment| judgment.grade == grade)
            .count()
    }

    pub fn judged_request_ids(&self) -> Vec<&str> {
        self.by_request.keys().map(String::as_str).collect()
    }

    pub fn lookup(&self, request_id: &str, doc_id: &str) -> Option<RelevanceGrade> {
        self.by_request
            .get(request_id)
            .and_then(|docs| docs.get(doc_id))
            .map(|judgment| judgment.grade)
    }

    pub fn gain_for(&self, request_id: &str, doc_id: &str) -> u32 {
        self.lookup(request_id, doc_id)
            .map(RelevanceGrade::gain)
            .unwrap_or(0)
    }

    pub fn has_judgments(&self, request_id: &str) -> bool {
        self.by_request
            .get(request_id)
            .map(|docs| !docs.is_empty())
            .unwrap_or(false)
    }

    pub fn positive_judgments(&self, request_id: &str) -> Vec<(&str, RelevanceGrade)> {
        self.by_request
            .get(request_id)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, judgment)| judgment.grade.is_positive())
                    .map(|(doc_id, judgment)| (doc_id.as_str(), judgment.grade))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn request_judgments(&self, request_id: &str) -> Vec<(&str, &RelevanceJudgment)> {
        self.by_request
            .get(request_id)
            .map(|docs| {
                docs.iter()
                    .map(|(doc_id, judgment)| (doc_id.as_str(), judgment))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn relevant_docids(&self, request_id: &str, policy: GoldPolicy) -> BTreeSet<String> {
        self.by_request
            .get(request_id)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, judgment)| policy.admits(judgment.grade))
                    .map(|(doc_id, _)| doc_id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn parse_plain_row(line: &str, line_number: usize) -> Result<(String, String, RelevanceJudgment)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        bail!(
            "judgment row at line {line_number} has {} fields, expected 3 (request, docid, grade)",
            fields.len()
        );
    }

    let grade = RelevanceGrade::from_code(fields[2])
        .with_context(|| format!("judgment row at line {line_number}"))?;

    Ok((
        fields[0].to_string(),
        fields[1].to_string(),
        RelevanceJudgment {
            grade,
            annotator: None,
            judged_at: None,
        },
    ))
}

fn parse_annotated_row(
    line: &str,
    line_number: usize,
) -> Result<(String, String, RelevanceJudgment)> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 5 {
        bail!(
            "judgment row at line {line_number} has {} comma-separated fields, \
             expected 5 (annotator, request, docid, grade, timestamp)",
            fields.len()
        );
    }

    let grade = RelevanceGrade::from_code(fields[3])
        .with_context(|| format!("judgment row at line {line_number}"))?;

    Ok((
        fields[1].to_string(),
        fields[2].to_string(),
        RelevanceJudgment {
            grade,
            annotator: Some(fields[0].to_string()),
            judged_at: Some(fields[4].to_string()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{GoldPolicy, JudgmentStore, RelevanceGrade};

    const PLAIN_QRELS: &str = "\
REQ-1 doc-a 1
REQ-1 doc-b 2
REQ-1 doc-c 3
REQ-2 doc-a 1
";

    #[test]
    fn parse_reads_whitespace_separated_rows() {
        let store = JudgmentStore::parse(PLAIN_QRELS).expect("plain qrels should parse");
        assert_eq!(store.len(), 4);
        assert_eq!(store.request_count(), 2);
        assert_eq!(
            store.lookup("REQ-1", "doc-a"),
            Some(RelevanceGrade::RequestRelevant)
        );
        assert_eq!(
            store.lookup("REQ-1", "doc-b"),
            Some(RelevanceGrade::TaskRelevant)
        );
        assert_eq!(
            store.lookup("REQ-1", "doc-c"),
            Some(RelevanceGrade::NotRelevant)
        );
        assert_eq!(store.lookup("REQ-1", "doc-z"), None);
    }

    #[test]
    fn parse_reads_annotated_comma_rows() {
        let raw = "1,DR-T1-1,EN-1234,1,2020-01-01\nalice,DR-T1-1,EN-9999,2,2024-05-01T10:00:00Z\n";
        let store = JudgmentStore::parse(raw).expect("annotated qrels should parse");
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.lookup("DR-T1-1", "EN-1234"),
            Some(RelevanceGrade::RequestRelevant)
        );

        let rows = store.request_judgments("DR-T1-1");
        assert_eq!(rows.len(), 2);
        let (_, judgment) = rows[0];
        assert_eq!(judgment.annotator.as_deref(), Some("1"));
        assert_eq!(judgment.judged_at.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn parse_accepts_tab_separated_rows() {
        let store = JudgmentStore::parse("REQ-1\tdoc-a\t1\n").expect("tabs should parse");
        assert_eq!(
            store.lookup("REQ-1", "doc-a"),
            Some(RelevanceGrade::RequestRelevant)
        );
    }

    #[test]
    fn later_duplicate_judgment_replaces_earlier() {
        let raw = "REQ-1 doc-a 1\nREQ-1 doc-a 3\n";
        let store = JudgmentStore::parse(raw).expect("duplicate rows should parse");
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.lookup("REQ-1", "doc-a"),
            Some(RelevanceGrade::NotRelevant)
        );
    }

    #[test]
    fn unknown_grade_code_is_rejected() {
        let err = JudgmentStore::parse("REQ-1 doc-a 4\n").expect_err("grade 4 should be rejected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn wrong_field_count_is_rejected() {
        let err = JudgmentStore::parse("REQ-1 doc-a\n").expect_err("two fields should be rejected");
        assert!(err.to_string().contains("expected 3"));
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let store = JudgmentStore::load(Path::new("no-such-qrels.txt"))
            .expect("a missing judgment file is not an error");
        assert!(store.is_empty());
    }

    #[test]
    fn positive_judgments_exclude_not_relevant() {
        let store = JudgmentStore::parse(PLAIN_QRELS).expect("plain qrels should parse");
        let positives = store.positive_judgments("REQ-1");
        assert_eq!(positives.len(), 2);
        assert!(positives.iter().all(|(_, grade)| grade.is_positive()));
    }

    #[test]
    fn gold_policy_filters_by_grade() {
        let store = JudgmentStore::parse(PLAIN_QRELS).expect("plain qrels should parse");

        let request_only = store.relevant_docids("REQ-1", GoldPolicy::RequestOnly);
        assert_eq!(request_only.into_iter().collect::<Vec<_>>(), vec!["doc-a"]);

        let broad = store.relevant_docids("REQ-1", GoldPolicy::TaskOrRequest);
        assert_eq!(broad.len(), 2);
        assert!(broad.contains("doc-a"));
        assert!(broad.contains("doc-b"));
    }

    #[test]
    fn gains_follow_grade_ladder() {
        assert_eq!(RelevanceGrade::RequestRelevant.gain(), 2);
        assert_eq!(RelevanceGrade::TaskRelevant.gain(), 1);
        assert_eq!(RelevanceGrade::NotRelevant.gain(), 0);
    }

    #[test]
    fn gain_for_treats_unjudged_as_zero() {
        let store = JudgmentStore::parse(PLAIN_QRELS).expect("plain qrels should parse");
        assert_eq!(store.gain_for("REQ-1", "doc-a"), 2);
        assert_eq!(store.gain_for("REQ-1", "doc-c"), 0);
        assert_eq!(store.gain_for("REQ-1", "never-judged"), 0);
    }

    #[test]
    fn has_judgments_distinguishes_judged_requests() {
        let store = JudgmentStore::parse(PLAIN_QRELS).expect("plain qrels should parse");
        assert!(store.has_judgments("REQ-1"));
        assert!(!store.has_judgments("REQ-99"));
    }
}
