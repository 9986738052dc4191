use crate::analysis::{DatasetAnalysis, SearchHit, SequenceType};
use crate::ingest::IngestSummary;
use std::fmt;
use std::path::PathBuf;

/// Text summary of a finished ingestion run
pub struct IngestReport<'a> {
    summary: &'a IngestSummary,
}

impl<'a> IngestReport<'a> {
    pub fn new(summary: &'a IngestSummary) -> Self {
        Self { summary }
    }
}

impl<'a> fmt::Display for IngestReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = self.summary;
        writeln!(f, "Ingestion Summary")?;
        writeln!(f, "=================")?;
        writeln!(f)?;
        if summary.cancelled {
            writeln!(f, "Status:     cancelled")?;
        }
        writeln!(f, "Files:      {}", summary.total_files)?;
        writeln!(f, "Processed:  {}", summary.total_processed)?;
        writeln!(f, "Succeeded:  {}", summary.total_succeeded)?;
        writeln!(f, "Studies:    {}", summary.studies.len())?;

        for study in &summary.studies {
            writeln!(f)?;
            writeln!(
                f,
                "{}  {}  {}",
                study.study_instance_uid,
                study.study_date.as_deref().unwrap_or("-"),
                study.description.as_deref().unwrap_or("")
            )?;
            writeln!(
                f,
                "  Patient: {}  Modalities: {}  Series: {}  Instances: {}",
                study.patient_id,
                study.modalities.join(","),
                study.num_series,
                study.num_instances
            )?;
            for series in &study.series {
                writeln!(
                    f,
                    "  [{}] {} {} ({} instances)",
                    series
                        .series_number
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    series.modality.as_deref().unwrap_or("??"),
                    series.description.as_deref().unwrap_or(""),
                    series.instances.len()
                )?;
            }
        }

        Ok(())
    }
}

/// Text report of a dataset analysis
pub struct AnalysisReport<'a> {
    analysis: &'a DatasetAnalysis,
}

impl<'a> AnalysisReport<'a> {
    pub fn new(analysis: &'a DatasetAnalysis) -> Self {
        Self { analysis }
    }
}

impl<'a> fmt::Display for AnalysisReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset Analysis Report")?;
        writeln!(f, "=======================")?;
        writeln!(f)?;
        writeln!(f, "Total Studies: {}", self.analysis.total_studies)?;
        writeln!(
            f,
            "Complete Studies (all sequences): {}",
            self.analysis.complete_studies
        )?;
        writeln!(f)?;
        writeln!(f, "Sequence Distribution:")?;
        for seq in SequenceType::ALL {
            let count = self.analysis.sequence_counts.get(&seq).copied().unwrap_or(0);
            writeln!(f, "- {}: {}", seq, count)?;
        }
        Ok(())
    }
}

/// One line per search hit
pub struct SearchReport<'a> {
    hits: &'a [SearchHit],
}

impl<'a> SearchReport<'a> {
    pub fn new(hits: &'a [SearchHit]) -> Self {
        Self { hits }
    }
}

impl<'a> fmt::Display for SearchReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits.is_empty() {
            return writeln!(f, "No matches");
        }
        for hit in self.hits {
            writeln!(f, "{:>3}  {:<8} {}  [{}]", hit.score, hit.kind, hit.text, hit.id)?;
        }
        Ok(())
    }
}

/// Stored files of one series, one path per line
pub struct FilesReport<'a> {
    series_uid: &'a str,
    files: &'a [PathBuf],
}

impl<'a> FilesReport<'a> {
    pub fn new(series_uid: &'a str, files: &'a [PathBuf]) -> Self {
        Self { series_uid, files }
    }
}

impl<'a> fmt::Display for FilesReport<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.files.is_empty() {
            return writeln!(f, "No stored files for series {}", self.series_uid);
        }
        for file in self.files {
            writeln!(f, "{}", file.display())?;
        }
        Ok(())
    }
}
