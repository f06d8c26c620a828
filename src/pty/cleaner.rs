//! Recovering a command's own output from an interactive transcript.

/// Returned when nothing is left after cleaning.
pub const EMPTY_OUTPUT_TEXT: &str = "Command executed";

/// Strip the terminal's echo of `command` and leading blank lines.
///
/// `command` is the text written to the shell. Its first line is dropped
/// where it appears on a line of its own. Any further lines are echoed
/// after the shell's prompt, so each is dropped from the first line ending
/// with it.
///
/// Line endings are normalized to `\n`. When `terminator` is given, the
/// line containing it and everything after are dropped. The remaining
/// lines are kept as they arrived, apart from trailing whitespace at the
/// very end.
pub fn clean_output(raw: &str, command: &str, terminator: Option<&str>) -> String {
    let mut echoed = command.lines().map(str::trim);
    let command = echoed.next().unwrap_or_default();
    let mut follow_up: Vec<&str> = echoed.filter(|line| !line.is_empty()).collect();
    let body = match terminator.and_then(|t| raw.find(t)) {
        Some(at) => &raw[..raw[..at].rfind('\n').map_or(0, |nl| nl + 1)],
        None => raw,
    };

    let mut kept: Vec<&str> = Vec::new();
    let mut echo_seen = false;

    for line in body.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let stripped = line.trim();

        if !echo_seen && !command.is_empty() && stripped == command {
            echo_seen = true;
            continue;
        }
        if let Some(at) = follow_up.iter().position(|echo| stripped.ends_with(echo)) {
            follow_up.remove(at);
            continue;
        }
        if kept.is_empty() && stripped.is_empty() {
            continue;
        }
        kept.push(line);
    }

    let cleaned = kept.join("\n");
    let cleaned = cleaned.trim_end();
    if cleaned.is_empty() {
        EMPTY_OUTPUT_TEXT.to_string()
    } else {
        cleaned.to_string()
    }
}
