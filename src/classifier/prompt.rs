//! Few-shot instructions for the classifier

/// Instruction block sent ahead of every transcript
///
/// Small local models drift into prose without the explicit rules and one
/// anchor example per label.
pub const INSTRUCTIONS: &str = "\
Classify the following command into exactly ONE category:
- happy
- curious
- concerned
- scared
- acknowledge
Rules:
- Output only the category word (happy, curious, concerned, scared, acknowledge).
- No explanation or extra text.
- If unsure, pick the closest category.
Examples:
\"Hello\" -> happy
\"What's that?\" -> curious
\"Help me\" -> concerned
\"Danger!\" -> scared
\"Status\" -> acknowledge";
