use std::path::Path;

use anyhow::{Context, Result};

use crate::util::persist_report;

#[derive(Debug, Clone)]
pub struct ComparisonRow {
    pub solution: String,
    pub judgment_set: &'static str,
    pub averaging: &'static str,
    pub result_set_size: usize,
    pub recall: Option<f64>,
    pub precision: Option<f64>,
    pub r_precision: Option<f64>,
    pub unjudged: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NdcgSummaryRow {
    pub solution: String,
    pub averaging: &'static str,
    pub ndcg: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RequestNdcgRow {
    pub request_id: String,
    pub ndcg: f64,
}

pub fn write_comparison_report(path: &Path, rows: &[ComparisonRow]) -> Result<()> {
    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer
            .write_record([
                "Solution",
                "Judgment Set Used",
                "Averaging",
                "Result Set Size",
                "Recall%",
                "Precision%",
                "R-Precision%",
                "Unjudged%",
            ])
            .context("failed to write comparison report header")?;

        for row in rows {
            let size_cell = row.result_set_size.to_string();
            let recall_cell = percent_cell(row.recall);
            let precision_cell = percent_cell(row.precision);
            let r_precision_cell = percent_cell(row.r_precision);
            let unjudged_cell = percent_cell(row.unjudged);
            writer
                .write_record([
                    row.solution.as_str(),
                    row.judgment_set,
                    row.averaging,
                    size_cell.as_str(),
                    recall_cell.as_str(),
                    precision_cell.as_str(),
                    r_precision_cell.as_str(),
                    unjudged_cell.as_str(),
                ])
                .context("failed to write comparison report row")?;
        }

        writer.flush().context("failed to flush comparison report")?;
    }

    persist_report(path, &buffer)
}

pub fn write_ndcg_summary(path: &Path, rows: &[NdcgSummaryRow]) -> Result<()> {
    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer
            .write_record(["Solution", "Averaging", "nDCG@R"])
            .context("failed to write ndcg summary header")?;

        for row in rows {
            let ndcg = ndcg_cell(row.ndcg);
            writer
                .write_record([row.solution.as_str(), row.averaging, ndcg.as_str()])
                .context("failed to write ndcg summary row")?;
        }

        writer.flush().context("failed to flush ndcg summary")?;
    }

    persist_report(path, &buffer)
}

pub fn write_request_ndcg_report(
    path: &Path,
    rows: &[RequestNdcgRow],
    total: Option<f64>,
) -> Result<()> {
    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        writer
            .write_record(["Request", "nDCG@R"])
            .context("failed to write request ndcg header")?;

        for row in rows {
            let ndcg = format!("{:.4}", row.ndcg);
            writer
                .write_record([row.request_id.as_str(), ndcg.as_str()])
                .context("failed to write request ndcg row")?;
        }

        let total_cell = ndcg_cell(total);
        writer
            .write_record(["TOTAL", total_cell.as_str()])
            .context("failed to write request ndcg total row")?;

        writer.flush().context("failed to flush request ndcg report")?;
    }

    persist_report(path, &buffer)
}

pub fn solution_file_label(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn percent_cell(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.2}"))
        .unwrap_or_default()
}

fn ndcg_cell(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.4}"))
        .unwrap_or_default()
}
