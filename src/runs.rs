use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RequestRun {
    pub request_id: String,
    pub docids: Vec<String>,
}

impl RequestRun {
    fn new(request_id: String) -> Self {
        RequestRun {
            request_id,
            docids: Vec::new(),
        }
    }

    fn push(&mut self, doc_id: &str) {
        self.docids.push(doc_id.to_string());
    }
}

#[derive(Debug, Default)]
pub struct RunIndex {
    by_request: BTreeMap<String, RequestRun>,
}

impl RunIndex {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "run file not found; treating the solution as answering no requests"
            );
            return Ok(RunIndex::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read run file: {}", path.display()))?;
        RunIndex::parse(&text)
            .with_context(|| format!("failed to parse run file: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let splitter = Regex::new(r"[ \t]+").context("failed to compile run row splitter")?;
        let mut index = RunIndex::default();
        let mut current: Option<RequestRun> = None;

        for (line_index, raw_line) in text.lines().enumerate() {
            let line_number = line_index + 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            let fields: Vec<&str> = splitter.split(line).collect();
            if fields.len() != 6 {
                bail!(
                    "run row at line {line_number} has {} fields, \
                     expected 6 (request, iteration, docid, rank, score, tag)",
                    fields.len()
                );
            }

            let request_id = fields[0];
            let doc_id = fields[2];
            fields[4].parse::<f64>().with_context(|| {
                format!(
                    "run row at line {line_number} has a non-numeric score: '{}'",
                    fields[4]
                )
            })?;

            match current.as_mut() {
                Some(run) if run.request_id == request_id => {
                    run.push(doc_id);
                }
                _ => {
                    if let Some(finished) = current.take() {
                        index.insert(finished);
                    }
                    let mut run = RequestRun::new(request_id.to_string());
                    run.push(doc_id);
                    current = Some(run);
                }
            }
        }

        if let Some(finished) = current.take() {
            index.insert(finished);
        }

        Ok(index)
    }

    fn insert(&mut self, run: RequestRun) {
        self.by_request.insert(run.request_id.clone(), run);
    }

    pub fn is_empty(&self) -> bool {
        self.by_request.is_empty()
    }

    pub fn request_count(&self) -> usize {
        self.by_request.len()
    }

    pub fn hit_count(&self) -> usize {
        self.by_request.values().map(|run| run.docids.len()).sum()
    }

    pub fn request_ids(&self) -> Vec<&str> {
        self.by_request.keys().map(String::as_str).collect()
    }

    pub fn docids(&self, request_id: &str, depth: usize) -> &[String] {
        match self.by_request.get(request_id) {
            Some(run) => {
                let end = depth.min(run.docids.len());
                &run.docids[..end]
            }
            None => &[],
        }
    }

    pub fn full_docids(&self, request_id: &str) -> &[String] {
        self.docids(request_id, usize::MAX)
    }
}
