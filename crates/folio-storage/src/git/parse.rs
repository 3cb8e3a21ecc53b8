//! Parsers for git's machine-readable output.

use folio_types::{ChangeStatus, Commit, CommitAuthor, GitStatus, StatusEntry};

use super::GitError;

/// `git log` format: fields separated by NUL so subjects containing `|` or
/// other punctuation can't shift columns.
pub const LOG_FORMAT: &str = "--format=%H%x00%h%x00%s%x00%an%x00%ae%x00%aI";

const LOG_FIELDS: usize = 6;

/// Porcelain prefixes that mark an unmerged path.
const CONFLICT_PREFIXES: [&str; 3] = ["UU ", "AA ", "DD "];

/// Parse `git status --porcelain -b` output.
///
/// Malformed lines (shorter than 4 bytes, or without a space at column 2)
/// are skipped. Paths come back in API form with a leading `/`.
pub fn parse_status(output: &str) -> GitStatus {
    let mut status = GitStatus::default();

    for line in output.lines() {
        if let Some(header) = line.strip_prefix("## ") {
            parse_branch_header(header, &mut status);
            continue;
        }

        let bytes = line.as_bytes();
        if bytes.len() < 4 || bytes[2] != b' ' {
            continue;
        }
        let Some(raw_path) = line.get(3..) else {
            continue;
        };
        let path = api_path(porcelain_path(raw_path));
        let index = bytes[0] as char;
        let worktree = bytes[1] as char;

        if index == '?' && worktree == '?' {
            status.untracked.push(path);
            continue;
        }
        if index != ' ' && index != '?' {
            status
                .staged
                .push(StatusEntry::new(path.clone(), ChangeStatus::from_porcelain(index)));
        }
        if worktree != ' ' && worktree != '?' {
            status
                .unstaged
                .push(StatusEntry::new(path, ChangeStatus::from_porcelain(worktree)));
        }
    }

    status
}

/// `main...origin/main [ahead 2, behind 1]`, `main`, `No commits yet on main`.
fn parse_branch_header(header: &str, status: &mut GitStatus) {
    let (branch_part, tracking) = match header.find(" [") {
        Some(idx) => (&header[..idx], Some(&header[idx + 2..])),
        None => (header, None),
    };

    let branch_part = branch_part
        .strip_prefix("No commits yet on ")
        .or_else(|| branch_part.strip_prefix("Initial commit on "))
        .unwrap_or(branch_part);
    status.branch = branch_part
        .split("...")
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    if let Some(tracking) = tracking {
        for part in tracking.trim_end_matches(']').split(", ") {
            if let Some(n) = part.strip_prefix("ahead ") {
                status.ahead = n.trim().parse().unwrap_or(0);
            } else if let Some(n) = part.strip_prefix("behind ") {
                status.behind = n.trim().parse().unwrap_or(0);
            }
        }
    }
}

/// Rename lines are `old -> new`; report the destination. Quoted paths lose
/// their quotes.
fn porcelain_path(raw: &str) -> &str {
    let path = match raw.rsplit_once(" -> ") {
        Some((_, new)) => new,
        None => raw,
    };
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
}

fn api_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Unmerged paths from `git status --porcelain` output.
pub fn parse_conflicts(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| CONFLICT_PREFIXES.iter().any(|p| line.starts_with(p)))
        .filter_map(|line| line.get(3..))
        .map(|path| api_path(porcelain_path(path)))
        .collect()
}

/// Parse output produced with [`LOG_FORMAT`].
///
/// Every non-empty line must carry exactly six fields; anything else means
/// the format and parser disagree, which is reported rather than guessed at.
pub fn parse_log(output: &str) -> Result<Vec<Commit>, GitError> {
    let mut commits = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\0').collect();
        if fields.len() != LOG_FIELDS {
            return Err(GitError::UnexpectedOutput(format!(
                "expected {} log fields, got {}: {:?}",
                LOG_FIELDS,
                fields.len(),
                line
            )));
        }
        commits.push(Commit {
            sha: fields[0].to_string(),
            short_sha: fields[1].to_string(),
            message: fields[2].to_string(),
            author: CommitAuthor {
                name: fields[3].to_string(),
                email: fields[4].to_string(),
            },
            date: fields[5].to_string(),
        });
    }
    Ok(commits)
}
