//! Segment-based exclusion of archive entry paths.

use crate::archive::PathExclusion;

/// Excludes an entry when any `/`-separated segment of its name matches one of the patterns
/// (`*` and `?` wildcards) or is OS metadata such as macOS `._` resource forks.
#[derive(Clone, Debug, Default)]
pub struct ExcludeFilter {
    patterns: Vec<String>,
}

impl ExcludeFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| p.as_ref().trim_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    fn is_excluded_segment(&self, segment: &str) -> bool {
        is_os_metadata_name(segment) || self.patterns.iter().any(|p| glob_match(p, segment))
    }
}

impl PathExclusion for ExcludeFilter {
    fn is_excluded_path(&self, path: &str) -> bool {
        path.split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .any(|s| self.is_excluded_segment(s))
    }
}

/// macOS resource fork files start with `._`.
pub fn is_os_metadata_name(name: &str) -> bool {
    name.starts_with("._") && name.len() > 2
}

/// Simple glob pattern matching (supports * and ?), whole-string.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    // Last `*` seen and the text position it is currently matched up to.
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ti));
                pi += 1;
            }
            Some(&c) if c == '?' || c == t[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    pi = sp + 1;
                    ti = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
