//! Line-oriented drift scoring.
//!
//! The change count is the length of the shortest edit script between the
//! baseline and the fresh output (lines removed plus lines added), computed
//! with Myers' O((N+M)D) algorithm. Unchanged lines never count.

use std::fmt;

/// One line of an annotated diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine<'a> {
    Same(&'a str),
    Removed(&'a str),
    Added(&'a str),
}

impl DiffLine<'_> {
    pub fn is_change(&self) -> bool {
        !matches!(self, DiffLine::Same(_))
    }
}

impl fmt::Display for DiffLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffLine::Same(l) => write!(f, " {l}"),
            DiffLine::Removed(l) => write!(f, "-{l}"),
            DiffLine::Added(l) => write!(f, "+{l}"),
        }
    }
}

/// Number of added plus removed lines between `before` and `after`.
pub fn change_count(before: &str, after: &str) -> usize {
    let a: Vec<&str> = before.lines().collect();
    let b: Vec<&str> = after.lines().collect();
    shortest_edit(&a, &b, None)
}

/// `true` when `changes` is strictly greater than `limit`.
pub fn exceeds(changes: usize, limit: i64) -> bool {
    i64::try_from(changes).map_or(true, |c| c > limit)
}

/// Full annotated diff from `before` to `after`.
///
/// The backtracking trace grows with the square of the change count; use
/// [`diff_lines_bounded`] when the inputs are not under your control.
pub fn diff_lines<'a>(before: &'a str, after: &'a str) -> Vec<DiffLine<'a>> {
    let a: Vec<&str> = before.lines().collect();
    let b: Vec<&str> = after.lines().collect();
    let mut trace = Vec::new();
    shortest_edit(&a, &b, Some(&mut trace));
    backtrack(&a, &b, &trace)
}

/// Annotated diff, or `None` when more than `max_changes` lines changed.
///
/// The count is taken first in linear space, so an oversized drift never
/// builds a trace.
pub fn diff_lines_bounded<'a>(
    before: &'a str,
    after: &'a str,
    max_changes: usize,
) -> Option<Vec<DiffLine<'a>>> {
    if change_count(before, after) > max_changes {
        return None;
    }
    Some(diff_lines(before, after))
}

/// Render a diff as `+`/`-`/` ` prefixed lines.
pub fn render(diff: &[DiffLine<'_>]) -> String {
    let mut out = String::new();
    for line in diff {
        out.push_str(&line.to_string());
        out.push('\n');
    }
    out
}

/// Myers forward pass. Returns the edit distance D; when `trace` is given,
/// round d records the live diagonals `-d..=d` of V as they stood when the
/// round began.
fn shortest_edit(a: &[&str], b: &[&str], mut trace: Option<&mut Vec<Vec<isize>>>) -> usize {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    let offset = max;
    let mut v = vec![0isize; 2 * max as usize + 2];
    let at = |k: isize| (k + offset) as usize;

    for d in 0..=max {
        if let Some(t) = trace.as_mut() {
            t.push(v[at(-d)..=at(d)].to_vec());
        }
        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
                v[at(k + 1)]
            } else {
                v[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[at(k)] = x;
            if x >= n && y >= m {
                return d as usize;
            }
            k += 2;
        }
    }
    max as usize
}

fn backtrack<'a>(a: &[&'a str], b: &[&'a str], trace: &[Vec<isize>]) -> Vec<DiffLine<'a>> {
    let mut x = a.len() as isize;
    let mut y = b.len() as isize;
    let mut out = Vec::new();

    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        if d == 0 {
            while x > 0 && y > 0 {
                out.push(DiffLine::Same(a[(x - 1) as usize]));
                x -= 1;
                y -= 1;
            }
            break;
        }
        // Slice index of diagonal k in round d.
        let at = |k: isize| (k + d) as usize;
        let k = x - y;
        let prev_k = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[at(prev_k)];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            out.push(DiffLine::Same(a[(x - 1) as usize]));
            x -= 1;
            y -= 1;
        }
        if x == prev_x {
            out.push(DiffLine::Added(b[prev_y as usize]));
        } else {
            out.push(DiffLine::Removed(a[prev_x as usize]));
        }
        x = prev_x;
        y = prev_y;
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_is_zero() {
        assert_eq!(change_count("a\nb\nc\n", "a\nb\nc\n"), 0);
    }

    #[test]
    fn single_replacement_counts_two() {
        assert_eq!(change_count("a", "b"), 2);
        assert_eq!(change_count("a\n", "b\n"), 2);
    }

    #[test]
    fn pure_addition() {
        assert_eq!(change_count("a\nb\n", "a\nx\nb\ny\n"), 2);
    }

    #[test]
    fn pure_removal() {
        assert_eq!(change_count("a\nx\nb\n", "a\nb\n"), 1);
    }

    #[test]
    fn empty_sides() {
        assert_eq!(change_count("", ""), 0);
        assert_eq!(change_count("", "a\nb\n"), 2);
        assert_eq!(change_count("a\nb\nc\n", ""), 3);
    }

    #[test]
    fn trailing_newline_is_not_drift() {
        assert_eq!(change_count("a\nb", "a\nb\n"), 0);
    }

    #[test]
    fn crlf_matches_lf() {
        assert_eq!(change_count("a\r\nb\r\n", "a\nb\n"), 0);
    }

    #[test]
    fn reorder_counts_moves() {
        // Moving one line is one removal plus one addition.
        assert_eq!(change_count("a\nb\nc\n", "b\nc\na\n"), 2);
    }

    #[test]
    fn symmetric() {
        let cases = [
            ("a\nb\nc\n", "a\nc\nd\ne\n"),
            ("", "x\n"),
            ("sg-1\nsg-2\nsg-3\n", "sg-3\nsg-2\nsg-1\n"),
            ("one\ntwo\nthree\nfour\n", "zero\none\nthree\nfive\n"),
        ];
        for (a, b) in cases {
            assert_eq!(change_count(a, b), change_count(b, a), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn exceeds_is_strict() {
        assert!(!exceeds(0, 0));
        assert!(exceeds(1, 0));
        assert!(!exceeds(2, 2));
        assert!(exceeds(3, 2));
        assert!(exceeds(0, -1));
    }

    #[test]
    fn diff_lines_annotates() {
        let diff = diff_lines("a\nb\nc\n", "a\nx\nc\n");
        assert_eq!(
            diff,
            vec![
                DiffLine::Same("a"),
                DiffLine::Removed("b"),
                DiffLine::Added("x"),
                DiffLine::Same("c"),
            ]
        );
    }

    #[test]
    fn diff_lines_agrees_with_count() {
        let (a, b) = ("one\ntwo\nthree\nfour\n", "zero\none\nthree\nfive\n");
        let diff = diff_lines(a, b);
        assert_eq!(diff.iter().filter(|l| l.is_change()).count(), change_count(a, b));
        let kept: Vec<_> = diff
            .iter()
            .filter_map(|l| match l {
                DiffLine::Same(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(kept, vec!["one", "three"]);
    }

    #[test]
    fn diff_lines_identical_and_one_sided() {
        assert_eq!(
            diff_lines("a\nb\n", "a\nb\n"),
            vec![DiffLine::Same("a"), DiffLine::Same("b")]
        );
        assert_eq!(diff_lines("", "x\n"), vec![DiffLine::Added("x")]);
        assert_eq!(
            diff_lines("x\ny\n", ""),
            vec![DiffLine::Removed("x"), DiffLine::Removed("y")]
        );
    }

    #[test]
    fn long_output_with_few_changes() {
        let before: String = (0..10_000).map(|i| format!("sg-{i}\n")).collect();
        let after = before.replace("sg-5000\n", "sg-5000-open\n") + "sg-new\n";
        let diff = diff_lines_bounded(&before, &after, 100).unwrap();
        assert_eq!(diff.len(), 10_002);
        let changed: Vec<_> = diff.iter().filter(|l| l.is_change()).copied().collect();
        assert_eq!(
            changed,
            vec![
                DiffLine::Removed("sg-5000"),
                DiffLine::Added("sg-5000-open"),
                DiffLine::Added("sg-new"),
            ]
        );
    }

    #[test]
    fn fully_rewritten_output_is_not_traced() {
        let before: String = (0..3000).map(|i| format!("a{i}\n")).collect();
        let after: String = (0..3000).map(|i| format!("b{i}\n")).collect();
        assert!(diff_lines_bounded(&before, &after, 1000).is_none());
        assert_eq!(change_count(&before, &after), 6000);
    }

    #[test]
    fn render_prefixes() {
        let diff = diff_lines("a\n", "b\n");
        assert_eq!(render(&diff), "-a\n+b\n");
    }
}
