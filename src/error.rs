use thiserror::Error;

/// Fatal pipeline failures. Anything else (a line, chunk or section with no
/// quantity in it) is not an error and simply leaves keys out of the record.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed for {url}: {source}")]
    FetchFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("malformed document: {0}")]
    MalformedDocument(String),
}
