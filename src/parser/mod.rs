pub mod extract;
pub mod quantity;
pub mod sections;
pub mod summary;
pub mod text;

use crate::error::PipelineError;
use extract::FlatRecord;
use sections::Report;

pub struct Extracted {
    pub report: Report,
    pub record: FlatRecord,
}

/// Two-pass pipeline: document → sections → flat record.
pub fn process_document(html: &str) -> Result<Extracted, PipelineError> {
    let report = sections::decompose(html)?;
    let record = extract::flatten(&report);
    Ok(Extracted { report, record })
}
