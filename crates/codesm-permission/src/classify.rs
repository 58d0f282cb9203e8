//! Pattern-matches shell commands against known-sensitive operations.
//! Purely textual; it never inspects the actual filesystem or git state.

const GIT_COMMANDS_REQUIRING_PERMISSION: &[&str] = &[
    "commit", "push", "merge", "rebase", "reset", "checkout", "stash", "cherry-pick",
    "revert", "tag", "branch -d", "branch -D", "clean", "pull", "fetch",
];

const DANGEROUS_COMMANDS: &[&str] =
    &["rm -rf", "rm -r", "rmdir", "sudo", "chmod", "chown", "dd", "mkfs", "fdisk", "> /dev/", "curl | sh", "curl | bash"];

const GH_MUTATING_SUBCOMMANDS: &[&str] = &["pr create", "pr merge", "issue create", "release create"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: String,
    pub reason: String,
}

/// Returns `Some` if `command` needs user confirmation before running.
pub fn classify(command: &str) -> Option<Classification> {
    let cmd = command.trim().to_lowercase();

    if let Some(rest) = cmd.strip_prefix("git ") {
        let git_sub = rest.split_whitespace().next().unwrap_or("");
        for &git_cmd in GIT_COMMANDS_REQUIRING_PERMISSION {
            if git_sub == git_cmd || rest.starts_with(git_cmd) {
                return Some(Classification { kind: "git".to_string(), reason: format!("Git {git_cmd}") });
            }
        }
        if cmd.contains("--force") || cmd.contains("--hard") {
            return Some(Classification { kind: "git".to_string(), reason: "Git operation with dangerous flag".to_string() });
        }
    }

    for &dangerous in DANGEROUS_COMMANDS {
        if cmd.contains(dangerous) {
            return Some(Classification { kind: "dangerous".to_string(), reason: format!("Dangerous: {dangerous}") });
        }
    }

    if cmd.starts_with("gh ") {
        for &gh_cmd in GH_MUTATING_SUBCOMMANDS {
            if cmd.contains(gh_cmd) {
                return Some(Classification { kind: "github".to_string(), reason: format!("GitHub {gh_cmd}") });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn git_push_requires_permission() {
        let c = classify("git push origin main").unwrap();
        assert_eq!(c.kind, "git");
    }

    #[test]
    fn git_status_is_unclassified() {
        assert!(classify("git status").is_none());
    }

    #[test]
    fn git_force_flag_is_flagged_even_for_unknown_subcommand() {
        let c = classify("git push --force origin main").unwrap();
        assert_eq!(c.kind, "git");
    }

    #[test]
    fn rm_rf_is_dangerous() {
        let c = classify("rm -rf /tmp/scratch").unwrap();
        assert_eq!(c.kind, "dangerous");
    }

    #[test]
    fn gh_pr_create_requires_permission() {
        let c = classify("gh pr create --title foo").unwrap();
        assert_eq!(c.kind, "github");
    }

    #[test]
    fn gh_pr_list_is_unclassified() {
        assert!(classify("gh pr list").is_none());
    }

    #[test]
    fn plain_ls_is_unclassified() {
        assert!(classify("ls -la").is_none());
    }
}
