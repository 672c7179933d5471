use serde::Serialize;

/// One command reported by the instrumented shell.
///
/// `index` is the arrival position in the session log, starting at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedCommand {
    pub index: usize,
    pub text: String,
}

impl RecordedCommand {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Strip a log down to its command texts, keeping order.
pub fn texts(commands: &[RecordedCommand]) -> Vec<String> {
    commands.iter().map(|c| c.text.clone()).collect()
}
