//! Rule-table classification of mod file paths

use regex_lite::Regex;

/// Placeholder in fix destinations replaced with the mod's root folder name
pub const MOD_FOLDER_PLACEHOLDER: &str = "{{mod_folder}}";

/// Separator used for every path handed to the classifier
pub const PATH_SEPARATOR: char = '/';

/// Outcome of classifying a single tree entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Already at a canonical location
    Valid,
    /// Recognized but misplaced; carries the destination path relative to the tree root
    Fixable(String),
    /// Disposable artifact
    Delete,
    /// Directory without children
    EmptyDirectory,
    /// Matches no rule
    Unknown,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Valid => "valid",
            Verdict::Fixable(_) => "fixable",
            Verdict::Delete => "delete",
            Verdict::EmptyDirectory => "empty",
            Verdict::Unknown => "unknown",
        }
    }
}

/// Where a fixable file ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FixTarget {
    /// Folder template; the file keeps its name
    Folder(&'static str),
    /// Under `settings/`, keeping the subpath captured by the `keep` group
    Settings,
}

#[derive(Debug, Clone)]
struct FixRule {
    pattern: Regex,
    target: FixTarget,
}

const DELETE_PATTERNS: &[&str] = &[
    r"(?i)(^|/)resources/.*\.tex$",
    r"(?i)(^|/)database/.*\.dbr$",
    r"(?i)\.7z$",
    r"(?i)\.rar$",
    r"(?i)\.zip$",
    r"(?i)^(.*/)?(readme|changelog)\.txt$",
    r"(?i)^[^/]*\.txt$",
];

const VALID_PATTERNS: &[&str] = &[
    r"(?i)^mods/[^/]+/database/[^/]*\.arz$",
    r"(?i)^mods/[^/]+/database/templates\.arc$",
    r"(?i)^mods/[^/]+/resources/[^/]*\.arc$",
    r"(?i)^mods/[^/]+/video/[^/]*$",
    r"(?i)^settings/text_[a-z]{2}/.+$",
    r"(?i)^settings/fonts/.+$",
    r"(?i)^settings/ui/.+$",
    r"(?i)^[^/]*\.dll$",
];

const FIX_RULES: &[(&str, FixTarget)] = &[
    (r"(?i)\.arz$", FixTarget::Folder("mods/{{mod_folder}}/database")),
    (
        r"(?i)^(.*/)?templates\.arc$",
        FixTarget::Folder("mods/{{mod_folder}}/database"),
    ),
    (r"(?i)\.arc$", FixTarget::Folder("mods/{{mod_folder}}/resources")),
    (
        r"(?i)^(.*/)?video/[^/]*$",
        FixTarget::Folder("mods/{{mod_folder}}/video"),
    ),
    (r"(?i)(^|/)(?P<keep>text_[a-z]{2}/.+)$", FixTarget::Settings),
    (r"(?i)(^|/)(?P<keep>ui/.+\.(tex|psd))$", FixTarget::Settings),
    (
        r"(?i)(^|/)(?P<keep>fonts/.+\.(bmp|fnt|ttf|txt))$",
        FixTarget::Settings,
    ),
    (r"(?i)\.dll$", FixTarget::Folder("")),
];

/// Classifies paths against the delete, valid and fixable rule lists
///
/// Lists are checked in that order and the first matching rule wins, so a
/// path that is both disposable and canonical is always deleted.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    delete: Vec<Regex>,
    valid: Vec<Regex>,
    fixable: Vec<FixRule>,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PathClassifier {
    pub fn new() -> Self {
        Self {
            delete: DELETE_PATTERNS.iter().map(|p| compile(p)).collect(),
            valid: VALID_PATTERNS.iter().map(|p| compile(p)).collect(),
            fixable: FIX_RULES
                .iter()
                .map(|(p, target)| FixRule {
                    pattern: compile(p),
                    target: *target,
                })
                .collect(),
        }
    }

    /// Classify a `/`-separated path relative to the mod tree root
    pub fn classify(&self, path: &str, mod_root_name: &str) -> Verdict {
        if self.delete.iter().any(|re| re.is_match(path)) {
            tracing::debug!("Path '{}' matched criteria for deletion", path);
            return Verdict::Delete;
        }

        if self.valid.iter().any(|re| re.is_match(path)) {
            tracing::debug!("Path '{}' matched valid path criteria", path);
            return Verdict::Valid;
        }

        for rule in &self.fixable {
            let Some(caps) = rule.pattern.captures(path) else {
                continue;
            };
            let destination = match rule.target {
                FixTarget::Settings => {
                    let keep = caps.name("keep").map(|m| m.as_str()).unwrap_or_default();
                    format!("settings{}{}", PATH_SEPARATOR, keep)
                }
                FixTarget::Folder(template) => {
                    let folder = template.replace(MOD_FOLDER_PLACEHOLDER, mod_root_name);
                    join(&folder, file_name(path))
                }
            };
            tracing::debug!(
                "Path '{}' matched fixable path criteria, fix path '{}'",
                path,
                destination
            );
            return Verdict::Fixable(destination);
        }

        tracing::debug!("Path '{}' matched no rule", path);
        Verdict::Unknown
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

fn file_name(path: &str) -> &str {
    path.rsplit(PATH_SEPARATOR).next().unwrap_or(path)
}

fn join(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", folder, PATH_SEPARATOR, name)
    }
}
