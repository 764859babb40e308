//! Project identity from transcript locations
//!
//! Both vendors name the per-project directory after the absolute project
//! path with every `/` replaced by `-`. Claude keeps the leading separator
//! (`-Users-foo-code-repo`), Cursor drops it (`Users-foo-code-repo`).
//! Dashes that were part of a directory name cannot be told apart from
//! separators, so decoding is a best effort.

use std::path::{Component, Path};
use std::sync::OnceLock;

use crate::parser::Vendor;

/// Directory names that say nothing about the project itself.
const GENERIC_SEGMENTS: [&str; 10] = [
    "code", "projects", "src", "repos", "github", "work", "personal", "dev", "home", "Users",
];

/// Display name and optional organization derived from a project path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub name: String,
    pub org: Option<String>,
}

/// Decode a vendor directory name into an absolute path.
///
/// Returns `None` when a Claude name lacks its leading dash or the name is empty.
pub fn decode_path(encoded: &str, vendor: Vendor) -> Option<String> {
    let body = match vendor {
        Vendor::ClaudeCode => encoded.strip_prefix('-')?,
        Vendor::Cursor => encoded,
    };
    if body.is_empty() {
        return None;
    }
    Some(format!("/{}", body.replace('-', "/")))
}

/// Inverse of [`decode_path`].
pub fn encode_path(path: &str, vendor: Vendor) -> String {
    let joined = path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    match vendor {
        Vendor::ClaudeCode => format!("-{}", joined),
        Vendor::Cursor => joined,
    }
}

/// Name of the encoded project directory that holds `file`, i.e. the first
/// component below `projects_dir`. The file must sit deeper than that
/// directory.
pub fn encoded_project_dir(projects_dir: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(projects_dir).ok()?;
    let mut components = relative.components();
    let first = match components.next()? {
        Component::Normal(name) => name.to_str()?.to_string(),
        _ => return None,
    };
    components.next()?;
    Some(first)
}

/// Common prefix of the encoded project directory names under a Claude
/// projects root.
///
/// Computed on first use and kept for the lifetime of the value, so one
/// resolver sees a stable prefix even as new project directories appear.
#[derive(Debug, Default)]
pub struct ProjectPrefix {
    projects_dir: Option<std::path::PathBuf>,
    cached: OnceLock<String>,
}

impl ProjectPrefix {
    pub fn new(projects_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            projects_dir: Some(projects_dir.into()),
            cached: OnceLock::new(),
        }
    }

    /// A prefix that is always empty
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &str {
        self.cached.get_or_init(|| {
            let Some(dir) = self.projects_dir.as_deref() else {
                return String::new();
            };
            let Ok(entries) = std::fs::read_dir(dir) else {
                return String::new();
            };
            let names: Vec<String> = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().to_str().map(String::from))
                .filter(|name| name.starts_with('-'))
                .collect();
            common_prefix(&names)
        })
    }
}

/// Longest common prefix of the names, cut back to a dash boundary.
///
/// A lone name contributes its leading empty segment, the home container
/// and the username (`-Users-foo-`).
pub fn common_prefix(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => {
            let parts: Vec<&str> = only.split('-').collect();
            if parts.len() >= 3 {
                format!("{}-", parts[..3].join("-"))
            } else {
                String::new()
            }
        }
        [first, rest @ ..] => {
            let mut len = first.len();
            for name in rest {
                len = first
                    .bytes()
                    .zip(name.bytes())
                    .take(len)
                    .take_while(|(a, b)| a == b)
                    .count();
            }
            while !first.is_char_boundary(len) {
                len -= 1;
            }
            let prefix = &first[..len];
            if prefix.ends_with('-') {
                return prefix.to_string();
            }
            match prefix.rfind('-') {
                Some(idx) if idx > 0 => prefix[..=idx].to_string(),
                _ => String::new(),
            }
        }
    }
}

/// Project name from an encoded Claude directory name with the common
/// prefix removed.
fn name_from_encoded(encoded: &str, prefix: &str) -> String {
    if !prefix.is_empty() {
        if let Some(rest) = encoded.strip_prefix(prefix) {
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }
    let parts: Vec<&str> = encoded.split('-').collect();
    if parts.len() > 3 {
        return parts[3..].join("-");
    }
    encoded.trim_start_matches('-').to_string()
}

fn is_meaningful(segment: &str) -> bool {
    !GENERIC_SEGMENTS.contains(&segment) && !segment.starts_with('.')
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parent directory of the project, when it names something other than a
/// generic container.
fn org_of(segments: &[&str]) -> Option<String> {
    if segments.len() < 2 {
        return None;
    }
    let parent = segments[segments.len() - 2];
    is_meaningful(parent).then(|| parent.to_string())
}

/// Derive a display name and organization for a project path.
pub fn project_info(path: &str, vendor: Vendor, prefix: &ProjectPrefix) -> ProjectInfo {
    let segs = segments(path);
    let name = match vendor {
        Vendor::ClaudeCode => name_from_encoded(&encode_path(path, vendor), prefix.get()),
        Vendor::Cursor => {
            let meaningful: Vec<&str> = segs.iter().copied().filter(|s| is_meaningful(s)).collect();
            match meaningful.as_slice() {
                [] => segs.last().copied().unwrap_or(path).to_string(),
                [only] => only.to_string(),
                [.., a, b] => format!("{}-{}", a, b),
            }
        }
    };
    ProjectInfo {
        name,
        org: org_of(&segs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn claude(path: &str) -> ProjectInfo {
        project_info(path, Vendor::ClaudeCode, &ProjectPrefix::empty())
    }

    #[test]
    fn test_decode_claude_path() {
        assert_eq!(
            decode_path("-Users-foo-code-repo", Vendor::ClaudeCode).as_deref(),
            Some("/Users/foo/code/repo")
        );
        assert_eq!(
            decode_path("-home-user-projects-myapp", Vendor::ClaudeCode).as_deref(),
            Some("/home/user/projects/myapp")
        );
        assert_eq!(decode_path("Users-foo", Vendor::ClaudeCode), None);
        assert_eq!(decode_path("-", Vendor::ClaudeCode), None);
    }

    #[test]
    fn test_decode_cursor_path() {
        assert_eq!(
            decode_path("Users-foo-code-repo", Vendor::Cursor).as_deref(),
            Some("/Users/foo/code/repo")
        );
    }

    #[test]
    fn test_decode_round_trips() {
        for encoded in ["-Users-foo-code-repo", "-a", "-home-u-x-y-z"] {
            let decoded = decode_path(encoded, Vendor::ClaudeCode).unwrap();
            assert_eq!(encode_path(&decoded, Vendor::ClaudeCode), encoded);
        }
        let decoded = decode_path("Users-foo-bar", Vendor::Cursor).unwrap();
        assert_eq!(encode_path(&decoded, Vendor::Cursor), "Users-foo-bar");
    }

    #[test]
    fn test_project_info_without_prefix() {
        assert_eq!(
            claude("/Users/foo/code/myrepo"),
            ProjectInfo { name: "code-myrepo".into(), org: None }
        );
        assert_eq!(
            claude("/Users/foo/acme/myrepo"),
            ProjectInfo { name: "acme-myrepo".into(), org: Some("acme".into()) }
        );
        assert_eq!(
            claude("/Users/foo/personal/killerwebapps/naha-webapp"),
            ProjectInfo {
                name: "personal-killerwebapps-naha-webapp".into(),
                org: Some("killerwebapps".into())
            }
        );
    }

    #[test]
    fn test_hidden_parent_is_not_org() {
        assert_eq!(claude("/Users/foo/.config/tool").org, None);
    }

    #[test]
    fn test_cursor_project_info() {
        let info = project_info("/Users/foo/code/acme/app", Vendor::Cursor, &ProjectPrefix::empty());
        assert_eq!(info.name, "acme-app");
        assert_eq!(info.org, Some("acme".into()));
    }

    #[test]
    fn test_common_prefix() {
        let names = vec![
            "-Users-foo-code-ops".to_string(),
            "-Users-foo-personal-site".to_string(),
        ];
        assert_eq!(common_prefix(&names), "-Users-foo-");
        assert_eq!(common_prefix(&["-Users-foo-code-ops".to_string()]), "-Users-foo-");
        assert_eq!(common_prefix(&[]), "");
        let unrelated = vec!["-a".to_string(), "-b".to_string()];
        assert_eq!(common_prefix(&unrelated), "-");
        let no_dash = vec!["-abc".to_string(), "-abd".to_string()];
        assert_eq!(common_prefix(&no_dash), "-");
    }

    #[test]
    fn test_prefix_cache_strips_username() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("-Users-foo-code-ops")).unwrap();
        std::fs::create_dir(tmp.path().join("-Users-foo-personal-claude-activity-log")).unwrap();
        let prefix = ProjectPrefix::new(tmp.path());
        assert_eq!(prefix.get(), "-Users-foo-");

        // later directories do not change a computed prefix
        std::fs::create_dir(tmp.path().join("-opt-other")).unwrap();
        assert_eq!(prefix.get(), "-Users-foo-");

        let info = project_info(
            "/Users/foo/personal/claude-activity-log",
            Vendor::ClaudeCode,
            &prefix,
        );
        assert_eq!(info.name, "personal-claude-activity-log");
    }

    #[test]
    fn test_missing_root_gives_empty_prefix() {
        let prefix = ProjectPrefix::new("/nonexistent/projects/root");
        assert_eq!(prefix.get(), "");
    }

    #[test]
    fn test_encoded_project_dir() {
        let root = PathBuf::from("/r/projects");
        assert_eq!(
            encoded_project_dir(&root, &root.join("-a-b/s.jsonl")).as_deref(),
            Some("-a-b")
        );
        assert_eq!(
            encoded_project_dir(&root, &root.join("a-b/agent-transcripts/s.txt")).as_deref(),
            Some("a-b")
        );
        assert_eq!(encoded_project_dir(&root, &root.join("s.jsonl")), None);
        assert_eq!(encoded_project_dir(&root, &PathBuf::from("/elsewhere/x/s.jsonl")), None);
    }
}
