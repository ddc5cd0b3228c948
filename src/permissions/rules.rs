//! Static classification tables
//!
//! Tool allow-lists and the destructive shell-command rules are built once and
//! shared behind an `Arc`. Components receive the tables by injection instead
//! of reaching for globals, so tests can hand in their own.

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

/// Tools that only read state
const READ_ONLY_TOOLS: &[&str] = &[
    "Read",
    "Glob",
    "Grep",
    "LS",
    "NotebookRead",
    "WebFetch",
    "WebSearch",
    "TodoWrite",
    "BashOutput",
    "ListMcpResourcesTool",
    "ReadMcpResourceTool",
];

/// Tools that modify the workspace in bounded ways
const MUTATING_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit", "KillShell"];

/// Screen-control tools
const COMPUTER_TOOLS: &[&str] = &["computer", "screenshot", "mouse", "keyboard"];

/// Shell execution tools (classified by command content)
const SHELL_TOOLS: &[&str] = &["Bash"];

/// One destructive-pattern rule for shell commands
#[derive(Debug)]
pub struct DangerRule {
    /// Short rule name
    pub name: &'static str,
    /// Human-readable explanation shown to whoever grants consent
    pub reason: &'static str,
    pattern: Regex,
}

impl DangerRule {
    /// Compile a rule (patterns are matched case-insensitively)
    pub fn new(
        name: &'static str,
        pattern: &str,
        reason: &'static str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            reason,
            pattern: Regex::new(&format!("(?i){}", pattern))?,
        })
    }

    /// Check if the command matches this rule
    pub fn matches(&self, command: &str) -> bool {
        self.pattern.is_match(command)
    }
}

/// (name, pattern, reason)
const DANGER_PATTERNS: &[(&str, &str, &str)] = &[
    (
        "recursive-delete",
        r"\brm\b[^;&|]*\s(-[a-z]*[rf][a-z]*|--recursive|--force)\b",
        "Recursive or forced file deletion",
    ),
    (
        "windows-delete",
        r"\b(rmdir|rd)\s+/s\b|\bdel\s+/[sfq]\b|\bremove-item\b.*-recurse",
        "Recursive or forced file deletion",
    ),
    ("shred", r"\bshred\b", "Irrecoverable file destruction"),
    (
        "disk-format",
        r"\bmkfs(\.[a-z0-9]+)?\b|\bwipefs\b|\bformat\s+[a-z]:|\bformat-volume\b",
        "Disk formatting",
    ),
    (
        "disk-partition",
        r"\b(fdisk|sfdisk|parted|gdisk|diskpart)\b",
        "Disk partitioning",
    ),
    (
        "raw-disk-write",
        r"\bdd\b.*\bof=/dev/",
        "Raw write to a block device",
    ),
    (
        "shutdown",
        r"\b(shutdown|reboot|halt|poweroff)\b|\binit\s+[06]\b|\b(stop|restart)-computer\b",
        "System shutdown or reboot",
    ),
    (
        "registry-edit",
        r"\breg(\.exe)?\s+(add|delete|import|load|restore)\b|\bregedit\b|\b(set|new|remove)-itemproperty\b",
        "Windows registry modification",
    ),
    (
        "permission-change",
        r"\b(chmod|chown|chgrp|chattr|icacls|cacls|takeown)\b",
        "File ownership or permission change",
    ),
    (
        "force-kill",
        r"\bkill\s+(-9|-kill|-sigkill|-s\s+kill)\b|\b(killall|pkill)\b|\btaskkill\b|\bstop-process\b",
        "Forceful process termination",
    ),
    (
        "service-stop",
        r"\bsystemctl\s+(stop|disable|mask|kill)\b|\bservice\s+\S+\s+stop\b|\bsc(\.exe)?\s+(stop|delete)\b|\bstop-service\b",
        "Service termination",
    ),
    (
        "firewall",
        r"\b(iptables|ip6tables|nft|ufw|firewall-cmd|pfctl)\b|\bnetsh\s+(advfirewall|firewall)\b",
        "Firewall reconfiguration",
    ),
    (
        "network-config",
        r"\bifconfig\s+\S+\s+(down|up)\b|\bip\s+(link|addr|address|route)\s+(set|add|del|delete|flush)\b|\broute\s+(add|del|delete)\b|\bnmcli\b|\bnetsh\s+interface\b",
        "Network reconfiguration",
    ),
    (
        "remote-pipe",
        r"\b(curl|wget|iwr|invoke-webrequest|irm|invoke-restmethod)\b[^|]*\|\s*(sudo\s+)?(sh|bash|zsh|dash|ksh|fish|python[0-9.]*|perl|ruby|node|iex|invoke-expression|powershell|pwsh)\b",
        "Piping remote content into an interpreter",
    ),
    (
        "path-mutation",
        r"\bexport\s+path=|(^|[;&|\s])path=|\bsetx\s+path\b|\$env:path\s*\+?=",
        "Executable search path modification",
    ),
    (
        "git-force-push",
        r"\bgit\s+push\b.*(\s--force\b|\s-f\b|\s--force-with-lease\b|\s\+\S)",
        "Forced git history rewrite",
    ),
    (
        "git-history-rewrite",
        r"\bgit\s+(reset\s+--hard|filter-branch|filter-repo)\b|\bgit\s+rebase\b|\bgit\s+clean\s+-[a-z]*f",
        "Forced git history rewrite",
    ),
];

/// Immutable classification configuration
#[derive(Debug)]
pub struct ClassifierTables {
    /// Tools auto-approved (GREEN)
    pub read_only: HashSet<String>,
    /// Tools requiring consent (YELLOW)
    pub mutating: HashSet<String>,
    /// Screen-control tools (COMPUTER)
    pub computer: HashSet<String>,
    /// Shell tools classified by their command string
    pub shell: HashSet<String>,
    /// Destructive command rules
    pub danger_rules: Vec<DangerRule>,
}

static STANDARD_TABLES: LazyLock<Arc<ClassifierTables>> =
    LazyLock::new(|| Arc::new(ClassifierTables::build_standard()));

impl ClassifierTables {
    /// The built-in tables, shared process-wide
    pub fn standard() -> Arc<ClassifierTables> {
        STANDARD_TABLES.clone()
    }

    fn build_standard() -> Self {
        let danger_rules = DANGER_PATTERNS
            .iter()
            .filter_map(|(name, pattern, reason)| match DangerRule::new(name, pattern, reason) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    tracing::error!("[Classifier] Invalid danger rule '{}': {}", name, e);
                    None
                }
            })
            .collect();

        Self {
            read_only: to_set(READ_ONLY_TOOLS),
            mutating: to_set(MUTATING_TOOLS),
            computer: to_set(COMPUTER_TOOLS),
            shell: to_set(SHELL_TOOLS),
            danger_rules,
        }
    }

    /// First rule matching the command, if any
    pub fn match_danger(&self, command: &str) -> Option<&DangerRule> {
        self.danger_rules.iter().find(|rule| rule.matches(command))
    }
}

fn to_set(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}
