const MAX_LINE_CHARS: usize = 4096;
const MAX_OUTPUT_LINES: usize = 200;

#[derive(Clone, Copy)]
enum Escape {
    Start,
    Csi,
    Osc,
    OscEsc,
    String,
    StringEsc,
}

/// Returns `None` once the sequence is over.
fn step(state: Escape, c: char) -> Option<Escape> {
    match state {
        Escape::Start => match c {
            '[' => Some(Escape::Csi),
            ']' => Some(Escape::Osc),
            'P' | 'X' | '^' | '_' => Some(Escape::String),
            _ => None,
        },
        Escape::Csi => (!('@'..='~').contains(&c)).then_some(Escape::Csi),
        Escape::Osc => match c {
            '\x07' => None,
            '\x1b' => Some(Escape::OscEsc),
            _ => Some(Escape::Osc),
        },
        Escape::OscEsc => match c {
            '\\' => None,
            '\x1b' => Some(Escape::OscEsc),
            _ => Some(Escape::Osc),
        },
        Escape::String => match c {
            '\x1b' => Some(Escape::StringEsc),
            _ => Some(Escape::String),
        },
        Escape::StringEsc => match c {
            '\\' => None,
            '\x1b' => Some(Escape::StringEsc),
            _ => Some(Escape::String),
        },
    }
}

fn is_bidi_control(c: char) -> bool {
    matches!(c, '\u{061C}' | '\u{200E}' | '\u{200F}')
        || ('\u{202A}'..='\u{202E}').contains(&c)
        || ('\u{2066}'..='\u{2069}').contains(&c)
}

/// One printable log line: escapes dropped, tabs as spaces, line breaks
/// removed, capped in length.
pub fn sanitize_log_line(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_LINE_CHARS));
    let mut escape: Option<Escape> = None;
    let mut kept = 0usize;

    for c in input.chars() {
        if let Some(state) = escape {
            escape = step(state, c);
            continue;
        }
        match c {
            '\x1b' => {
                escape = Some(Escape::Start);
                continue;
            }
            '\t' => out.push(' '),
            c if c.is_control() || is_bidi_control(c) => continue,
            c => out.push(c),
        }
        kept += 1;
        if kept >= MAX_LINE_CHARS {
            out.push_str(" ...[truncated]");
            break;
        }
    }
    out
}

/// Splits captured remote output into sanitized, non-empty lines.
///
/// Keeps the last lines when the output is longer than the log budget.
pub fn sanitize_remote_output(output: &str) -> Vec<String> {
    let lines: Vec<String> = output
        .lines()
        .map(sanitize_log_line)
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.len() <= MAX_OUTPUT_LINES {
        return lines;
    }
    let skipped = lines.len() - MAX_OUTPUT_LINES;
    let mut out = Vec::with_capacity(MAX_OUTPUT_LINES + 1);
    out.push(format!("...[{skipped} earlier lines omitted]"));
    out.extend(lines.into_iter().skip(skipped));
    out
}
