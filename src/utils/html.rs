/// Sanitizes free text that is echoed back to other users (quiz descriptions,
/// question and option text, subjective answers).
///
/// Whitelist based: safe markup such as <b> or <p> survives, while <script>,
/// <iframe> and event-handler attributes are removed together with script bodies.
/// Surrounding whitespace is trimmed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input.trim())
}
