//! Batch pipeline: reads JSONL messages, ingests each one, optionally writes
//! the results as Arrow IPC files.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use fieldrep_ai::{IngestError, MemorySink, Pipeline};
use fieldrep_core::{RawMessage, columnar};
use tracing::warn;

#[derive(Debug)]
pub struct BatchStats {
    pub lines: usize,
    pub recorded: usize,
    pub rejected: usize,
    pub suggestions: usize,
    pub elapsed_secs: f64,
}

/// One input line: a `{"text", "report_type"}` object, or bare text.
pub fn parse_line(line: &str) -> Option<RawMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<RawMessage>(line) {
        Ok(raw) => Some(raw),
        Err(_) => Some(RawMessage::new(line)),
    }
}

/// Ingest every message in `input` into `sink`.
pub async fn run_batch(
    pipeline: &mut Pipeline,
    sink: &mut MemorySink,
    input: &Path,
) -> anyhow::Result<BatchStats> {
    let start = Instant::now();
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;

    let mut stats = BatchStats {
        lines: 0,
        recorded: 0,
        rejected: 0,
        suggestions: 0,
        elapsed_secs: 0.0,
    };

    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", n + 1))?;
        let Some(raw) = parse_line(&line) else {
            continue;
        };
        stats.lines += 1;

        match pipeline.ingest(&raw, sink).await {
            Ok(out) => {
                stats.recorded += 1;
                stats.suggestions += out.suggestions.len();
            }
            Err(IngestError::Parse(e)) => {
                warn!(line = n + 1, error = %e, "message rejected");
                stats.rejected += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("line {}", n + 1)),
        }
        eprint!("\r  Processed {} messages", stats.lines);
    }
    eprintln!();

    stats.elapsed_secs = start.elapsed().as_secs_f64();
    Ok(stats)
}

/// Write recorded reports as one Arrow IPC file.
pub fn write_reports(sink: &MemorySink, path: &Path) -> anyhow::Result<usize> {
    let rows: Vec<(&str, &_)> = sink
        .reports
        .iter()
        .map(|r| (r.report_id.as_str(), &r.report))
        .collect();
    let batch = columnar::reports_to_batch(&rows).context("building report batch")?;
    write_ipc(&batch, path)?;
    Ok(batch.num_rows())
}

/// Write recorded suggestions as one Arrow IPC file.
pub fn write_suggestions(sink: &MemorySink, path: &Path) -> anyhow::Result<usize> {
    let batch =
        columnar::suggestions_to_batch(&sink.suggestions).context("building suggestion batch")?;
    write_ipc(&batch, path)?;
    Ok(batch.num_rows())
}

fn write_ipc(batch: &RecordBatch, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = FileWriter::try_new(file, &batch.schema()).context("starting IPC file")?;
    writer.write(batch).context("writing IPC batch")?;
    writer.finish().context("finishing IPC file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::ipc::reader::FileReader;
    use fieldrep_ai::Normalizer;
    use fieldrep_core::ReportType;
    use std::io::Write;

    const INPUT: &str = r#"{"text": "Alpha Squad hold at coords 1.5, 2.5. Two wounded.", "report_type": "CASUALTY"}

{"text": "   ", "report_type": "SITREP"}
hostile patrol near the bridge, possible IED
{"text": "{'action': 'advance', 'target_units': ['Bravo Team']}", "report_type": "FRAGO"}
"#;

    fn input_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(INPUT.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_line_shapes() {
        let raw = parse_line(r#"{"text": "hold", "report_type": "contact"}"#).unwrap();
        assert_eq!(raw.report_type(), Some(ReportType::Contact));
        assert_eq!(parse_line("plain words").unwrap().text, "plain words");
        assert!(parse_line("   ").is_none());
    }

    #[tokio::test]
    async fn batch_counts() {
        let input = input_file();
        let mut pipeline = Pipeline::new(Normalizer::new());
        let mut sink = MemorySink::default();
        let stats = run_batch(&mut pipeline, &mut sink, input.path()).await.unwrap();

        assert_eq!(stats.lines, 4);
        assert_eq!(stats.recorded, 3);
        assert_eq!(stats.rejected, 1);
        // CASEVAC for line 1; EOINCREP and EOD for the plain SITREP line.
        assert_eq!(stats.suggestions, 3);
        assert_eq!(sink.reports[2].report.action, "advance");
    }

    #[tokio::test]
    async fn arrow_export_round_trips_row_counts() {
        let input = input_file();
        let mut pipeline = Pipeline::new(Normalizer::new());
        let mut sink = MemorySink::default();
        run_batch(&mut pipeline, &mut sink, input.path()).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let reports_path = dir.path().join("reports.arrow");
        let suggestions_path = dir.path().join("suggestions.arrow");
        assert_eq!(write_reports(&sink, &reports_path).unwrap(), 3);
        assert_eq!(write_suggestions(&sink, &suggestions_path).unwrap(), 3);

        let reader = FileReader::try_new(File::open(&reports_path).unwrap(), None).unwrap();
        assert_eq!(reader.schema().fields().len(), 12);
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 3);
    }

    #[tokio::test]
    async fn missing_input_is_an_error() {
        let mut pipeline = Pipeline::new(Normalizer::new());
        let mut sink = MemorySink::default();
        let err = run_batch(&mut pipeline, &mut sink, Path::new("/nonexistent/in.jsonl"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("opening"));
    }
}
