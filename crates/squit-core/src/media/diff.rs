//! Line diff rendering for human-readable reports.

/// Largest table the LCS computation will allocate.
const MAX_LCS_CELLS: usize = 4_000_000;

/// Render a line diff of two texts.
///
/// Unchanged lines are prefixed with two spaces, removed lines with `- `
/// and added lines with `+ `. Returns an empty string for equal input.
/// Texts with equal lines but different line endings get a note instead.
pub fn render_line_diff(expected: &str, actual: &str) -> String {
    if expected == actual {
        return String::new();
    }

    let old: Vec<&str> = expected.lines().collect();
    let new: Vec<&str> = actual.lines().collect();

    if old == new {
        return line_ending_note(expected, actual);
    }

    if (old.len() + 1) * (new.len() + 1) > MAX_LCS_CELLS {
        return positional_diff(&old, &new);
    }

    // lcs[i][j] = length of the longest common subsequence of old[i..] and new[j..]
    let mut lcs = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut out = String::new();
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            push_line(&mut out, "  ", old[i]);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            push_line(&mut out, "- ", old[i]);
            i += 1;
        } else {
            push_line(&mut out, "+ ", new[j]);
            j += 1;
        }
    }
    for line in &old[i..] {
        push_line(&mut out, "- ", line);
    }
    for line in &new[j..] {
        push_line(&mut out, "+ ", line);
    }

    out
}

fn positional_diff(old: &[&str], new: &[&str]) -> String {
    let mut out = String::new();
    for index in 0..old.len().max(new.len()) {
        match (old.get(index), new.get(index)) {
            (Some(a), Some(b)) if a == b => push_line(&mut out, "  ", a),
            (a, b) => {
                if let Some(a) = a {
                    push_line(&mut out, "- ", a);
                }
                if let Some(b) = b {
                    push_line(&mut out, "+ ", b);
                }
            }
        }
    }
    out
}

fn line_ending_note(expected: &str, actual: &str) -> String {
    match (expected.ends_with('\n'), actual.ends_with('\n')) {
        (true, false) => "\\ No newline at end of actual\n".to_string(),
        (false, true) => "\\ No newline at end of expected\n".to_string(),
        _ => format!(
            "\\ Line endings differ: expected {} bytes, got {} bytes\n",
            expected.len(),
            actual.len()
        ),
    }
}

fn push_line(out: &mut String, prefix: &str, line: &str) {
    out.push_str(prefix);
    out.push_str(line);
    out.push('\n');
}
