//! Query construction.

use std::path::Path;

use crate::dataset::Task;

use super::answer::ANSWER_MARKER;

/// Answer formatting rules appended to every query.
const FORMAT_RULES: &str = "YOUR FINAL ANSWER should be a number OR as few words as possible OR a comma separated list of numbers and/or strings. \
If you are asked for a number, don't use comma to write your number neither use units such as $ or percent sign unless specified otherwise. \
If you are asked for a string, don't use articles, neither abbreviations (e.g. for cities), and write the digits in plain text unless specified otherwise. \
If you are asked for a comma separated list, apply the above rules depending of whether the element to be put in the list is a number or a string.";

/// Builds the prompt for one attempt at `task`.
///
/// The result depends only on its inputs, so every attempt sees the same
/// query. `output_path` should be absolute; the agent may run elsewhere.
pub fn build_query(task: &Task, output_path: &Path) -> String {
    let mut query = format!("Your task is: {}", task.question);
    if let Some(attachment) = task.attachment() {
        query.push_str(&format!(
            "\n{} is the absolute file path you need to use.",
            attachment.display()
        ));
    }
    query.push_str(&format!(
        "\nWrite down your answer to file {} with the following template: {}[YOUR FINAL ANSWER]. {}",
        output_path.display(),
        ANSWER_MARKER,
        FORMAT_RULES
    ));
    query
}
