//! Plain-text report of a finished job: its log followed by its findings.

use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};

use super::job::Job;
use crate::error::{PagewiseError, Result};

const RULE: &str = "========================================";

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Renders the report. Only terminal jobs can be exported.
pub fn render_report(job: &Job) -> Result<String> {
    if !job.is_terminal() {
        return Err(PagewiseError::JobNotTerminal {
            job_id: job.id.clone(),
            status: job.status,
        });
    }

    let mut out = String::new();
    write_report(&mut out, job)?;
    Ok(out)
}

/// Writes the report for `job` into any formatter sink.
pub fn write_report<W: Write>(out: &mut W, job: &Job) -> std::fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Analysis report: {}", job.source_name)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "Job:      {}", job.id)?;
    writeln!(out, "Kind:     {}", job.kind)?;
    writeln!(out, "Model:    {}", job.model)?;
    writeln!(out, "Status:   {}", job.status)?;
    writeln!(out, "Created:  {}", timestamp(&job.created_at))?;
    if let Some(started) = &job.started_at {
        writeln!(out, "Started:  {}", timestamp(started))?;
    }
    if let Some(finished) = &job.finished_at {
        writeln!(out, "Finished: {}", timestamp(finished))?;
    }
    if let Some(usage) = &job.usage {
        writeln!(
            out,
            "Tokens:   {} prompt / {} response",
            usage.prompt_tokens, usage.response_tokens
        )?;
    }

    writeln!(out)?;
    writeln!(out, "LOGS")?;
    writeln!(out, "----")?;
    for entry in &job.logs {
        writeln!(
            out,
            "[{}] {} {}",
            timestamp(&entry.timestamp),
            entry.level,
            entry.message
        )?;
    }

    writeln!(out)?;
    writeln!(out, "FINDINGS")?;
    writeln!(out, "--------")?;
    match &job.result {
        None => writeln!(out, "No findings (job did not complete).")?,
        Some(findings) if findings.is_empty() => writeln!(out, "No findings.")?,
        Some(findings) => {
            for (i, finding) in findings.iter().enumerate() {
                if i > 0 {
                    writeln!(out)?;
                }
                writeln!(out, "{}. {} [{}]", i + 1, finding.category, finding.severity)?;
                if !finding.pages.is_empty() {
                    let pages: Vec<String> = finding.pages.iter().map(u32::to_string).collect();
                    writeln!(out, "   Pages: {}", pages.join(", "))?;
                }
                if let Some(location) = &finding.location {
                    writeln!(out, "   Location: {}", location)?;
                }
                if let Some(excerpt) = &finding.excerpt {
                    writeln!(out, "   Excerpt: \"{}\"", excerpt)?;
                }
                for (key, value) in &finding.attributes {
                    match value.as_str() {
                        Some(s) => writeln!(out, "   {}: {}", key, s)?,
                        None => writeln!(out, "   {}: {}", key, value)?,
                    }
                }
                writeln!(out, "   {}", finding.justification)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobPatch, JobStatus, JobStore, OwnerId};
    use crate::model::{AnalysisKind, Finding, Severity};

    fn finished_job(patch: JobPatch) -> Job {
        let store = JobStore::new();
        let job = Job::new(
            OwnerId::from("alice"),
            AnalysisKind::ComplianceCheck,
            "policy.pdf",
            "gemini-2.5-flash",
        );
        let id = job.id.clone();
        store.insert(job).unwrap();
        store
            .update(
                &id,
                JobPatch::new()
                    .status(JobStatus::Processing)
                    .info("Processing started"),
            )
            .unwrap();
        store.update(&id, patch).unwrap()
    }

    /// Accepts `budget` bytes, then fails.
    struct Truncating {
        budget: usize,
    }

    impl Write for Truncating {
        fn write_str(&mut self, s: &str) -> std::fmt::Result {
            self.budget = self.budget.checked_sub(s.len()).ok_or(std::fmt::Error)?;
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_propagated() {
        let job = finished_job(JobPatch::new().status(JobStatus::Completed).result(Vec::new()));
        let mut sink = Truncating { budget: 64 };
        assert!(write_report(&mut sink, &job).is_err());

        let mut roomy = Truncating { budget: 1 << 20 };
        assert!(write_report(&mut roomy, &job).is_ok());
    }

    #[test]
    fn test_refuses_unfinished_job() {
        let job = Job::new(
            OwnerId::from("alice"),
            AnalysisKind::ComplianceCheck,
            "policy.pdf",
            "m",
        );
        assert!(matches!(
            render_report(&job),
            Err(PagewiseError::JobNotTerminal { .. })
        ));
    }

    #[test]
    fn test_completed_report() {
        let findings = vec![
            Finding::new(
                AnalysisKind::ComplianceCheck,
                "Alt text present",
                Severity::Fail,
                "Figure 2 has no alternative text.",
            )
            .with_pages([3, 4]),
            Finding::new(
                AnalysisKind::ComplianceCheck,
                "Language declared",
                Severity::Pass,
                "Document language is set.",
            ),
        ];
        let job = finished_job(
            JobPatch::new()
                .status(JobStatus::Completed)
                .result(findings)
                .info("Analysis complete: 2 findings"),
        );

        let report = render_report(&job).unwrap();
        assert!(report.contains("Analysis report: policy.pdf"));
        assert!(report.contains("Status:   completed"));
        assert!(report.contains("] INFO Processing started\n"));
        assert!(report.contains("1. Alt text present [FAIL]\n   Pages: 3, 4\n"));
        assert!(report.contains("2. Language declared [PASS]\n   Document language is set.\n"));
        assert!(report.find("LOGS").unwrap() < report.find("FINDINGS").unwrap());
    }

    #[test]
    fn test_error_report_has_no_findings() {
        let job = finished_job(
            JobPatch::new()
                .status(JobStatus::Error)
                .error("Analysis failed: bad PDF"),
        );
        let report = render_report(&job).unwrap();
        assert!(report.contains("] ERROR Analysis failed: bad PDF\n"));
        assert!(report.contains("No findings (job did not complete)."));
    }
}
