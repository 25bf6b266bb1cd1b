use std::cmp::Ordering;

/// Version normalization utilities
pub mod normalize {
    /// Strip a leading `v` or `V` from a version token.
    /// Examples: "v12.4" -> "12.4", "12.4-1" -> "12.4-1"
    pub fn to_plain_version(version: &str) -> &str {
        version
            .strip_prefix('v')
            .or_else(|| version.strip_prefix('V'))
            .unwrap_or(version)
    }
}

/// Split a version token into its segments. `.`, `-` and `_` all separate.
fn segments(version: &str) -> Vec<&str> {
    normalize::to_plain_version(version)
        .split(['.', '-', '_'])
        .filter(|part| !part.is_empty())
        .collect()
}

/// A maximal run of digits or of non-digits inside one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run<'a> {
    Number(&'a str),
    Text(&'a str),
}

/// "14rc1" -> [Number("14"), Text("rc"), Number("1")]
fn runs(segment: &str) -> Vec<Run<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut digits = None;

    for (i, c) in segment.char_indices() {
        let is_digit = c.is_ascii_digit();
        match digits {
            Some(previous) if previous != is_digit => {
                runs.push(run(&segment[start..i], previous));
                start = i;
            }
            _ => {}
        }
        digits = Some(is_digit);
    }
    if let Some(is_digit) = digits {
        runs.push(run(&segment[start..], is_digit));
    }
    runs
}

fn run(text: &str, is_digit: bool) -> Run<'_> {
    if is_digit {
        Run::Number(text)
    } else {
        Run::Text(text)
    }
}

/// Digit strings compared by value, without an overflow limit.
fn compare_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_run(a: &Run<'_>, b: &Run<'_>) -> Ordering {
    match (a, b) {
        (Run::Number(a), Run::Number(b)) => compare_numbers(a, b),
        (Run::Text(a), Run::Text(b)) => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
        (Run::Number(_), Run::Text(_)) => Ordering::Greater,
        (Run::Text(_), Run::Number(_)) => Ordering::Less,
    }
}

/// Order of two sequences that agree on their common prefix. A longer sequence
/// is newer when its next item is numeric and older when it is text, so
/// "12.4-1" > "12.4" but "14beta1" < "14".
fn compare_tail<T>(a: &[T], b: &[T], leads_with_text: impl Fn(&T) -> bool) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Greater if leads_with_text(&a[b.len()]) => Ordering::Less,
        Ordering::Greater => Ordering::Greater,
        Ordering::Less if leads_with_text(&b[a.len()]) => Ordering::Greater,
        Ordering::Less => Ordering::Less,
    }
}

fn compare_segment(a: &str, b: &str) -> Ordering {
    let a_runs = runs(a);
    let b_runs = runs(b);

    for (a_run, b_run) in a_runs.iter().zip(b_runs.iter()) {
        let ordering = compare_run(a_run, b_run);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    compare_tail(&a_runs, &b_runs, |run| matches!(run, Run::Text(_)))
}

/// Compare two version tokens segment by segment.
///
/// Each segment is split into digit and letter runs. Digit runs compare as
/// numbers, so "10.9" > "10.2" > "9.9" and "9beta" < "10". Letter runs compare
/// as case-insensitive text and rank below digits. A letter suffix marks a
/// pre-release: "14beta1" < "14rc1" < "14" and "14rc1" < "14.0". With an equal
/// prefix an extra numeric segment is newer ("12.4-1" > "12.4").
pub fn compare(a: &str, b: &str) -> Ordering {
    let a_parts = segments(a);
    let b_parts = segments(b);

    for (a_part, b_part) in a_parts.iter().zip(b_parts.iter()) {
        let ordering = compare_segment(a_part, b_part);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    compare_tail(&a_parts, &b_parts, |part| {
        !part.starts_with(|c: char| c.is_ascii_digit())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments_not_lexicographic() {
        assert_eq!(compare("10.9", "10.2"), Ordering::Greater);
        assert_eq!(compare("10.2", "9.9"), Ordering::Greater);
        assert_eq!(compare("12", "9"), Ordering::Greater);
        assert_eq!(compare("9.6.24", "10"), Ordering::Less);
    }

    #[test]
    fn test_build_suffix_and_length() {
        assert_eq!(compare("12.4-1", "12.4"), Ordering::Greater);
        assert_eq!(compare("12.4-2", "12.4-10"), Ordering::Less);
        assert_eq!(compare("13.0", "13.0"), Ordering::Equal);
    }

    #[test]
    fn test_prefix_and_text_segments() {
        assert_eq!(compare("v12.1", "12.1"), Ordering::Equal);
        assert_eq!(normalize::to_plain_version("V3"), "3");
        assert_eq!(compare("14beta1", "14beta2"), Ordering::Less);
    }

    #[test]
    fn test_mixed_alnum_segments() {
        assert_eq!(compare("9beta", "10"), Ordering::Less);
        assert_eq!(compare("10", "9beta"), Ordering::Greater);
        assert_eq!(compare("14beta1", "14"), Ordering::Less);
        assert_eq!(compare("14rc1", "14.0"), Ordering::Less);
        assert_eq!(compare("14beta2", "14rc1"), Ordering::Less);
        assert_eq!(compare("14rc1", "14RC1"), Ordering::Equal);
        assert_eq!(compare("14", "14-beta"), Ordering::Greater);
        assert_eq!(compare("15beta1", "14.9"), Ordering::Greater);
    }

    #[test]
    fn test_runs_split_digits_from_letters() {
        assert_eq!(
            runs("14rc1"),
            vec![Run::Number("14"), Run::Text("rc"), Run::Number("1")]
        );
        assert_eq!(runs("beta"), vec![Run::Text("beta")]);
        assert_eq!(compare_numbers("007", "7"), Ordering::Equal);
        assert_eq!(
            compare_numbers("100000000000000000000000", "99"),
            Ordering::Greater
        );
    }
}
