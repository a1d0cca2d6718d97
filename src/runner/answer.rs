//! Answer extraction from the agent's output file.

use std::path::Path;

use super::result::AttemptFailure;

/// Literal that precedes the answer in the output file.
pub const ANSWER_MARKER: &str = "FINAL ANSWER: ";

/// Returns the text between the first [`ANSWER_MARKER`] and the next one
/// (or the end of the text), trimmed.
///
/// `None` when the marker is absent. The returned answer may be empty.
pub fn extract_answer(text: &str) -> Option<String> {
    let (_, rest) = text.split_once(ANSWER_MARKER)?;
    let answer = rest.split(ANSWER_MARKER).next().unwrap_or(rest);
    Some(answer.trim().to_string())
}

/// Reads and validates the output file of an attempt.
pub async fn read_answer(path: &Path) -> Result<String, AttemptFailure> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AttemptFailure::MissingOutput(path.to_path_buf()));
        }
        Err(e) => return Err(AttemptFailure::UnreadableOutput(e)),
    };

    match extract_answer(&text) {
        None => Err(AttemptFailure::MissingMarker),
        Some(answer) if answer.is_empty() => Err(AttemptFailure::EmptyAnswer),
        Some(answer) => Ok(answer),
    }
}
