//! On-disk layout convention
//!
//! ```text
//! {root}/{owner}/{id}/info.json
//! {root}/{owner}/{id}/documentation.txt
//! {root}/{owner}/{id}/{chartType}-equity-chart.png
//! {root}/{owner}/{id}/code/
//! {root}/{owner}/{id}/image/
//! {root}/{owner}/{id}/report/
//! ```
//!
//! Paths are built by joining validated segments only, so an owner or chart
//! type coming from a request can never point outside its entity directory.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub const CODE_DIR: &str = "code";
pub const IMAGE_DIR: &str = "image";
pub const REPORT_DIR: &str = "report";

/// Subdirectories created for every entity
pub const ENTITY_DIRS: [&str; 3] = [CODE_DIR, IMAGE_DIR, REPORT_DIR];

pub const INFO_FILE: &str = "info.json";
pub const DOC_FILE: &str = "documentation.txt";
pub const EQUITY_CHART_SUFFIX: &str = "-equity-chart.png";

/// Suffix of the sibling file used by the atomic write protocol
pub const TEMP_SUFFIX: &str = ".temp";

/// A named artifact inside an entity directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind<'a> {
    Info,
    Documentation,
    EquityChart(&'a str),
}

impl ArtifactKind<'_> {
    /// File name of the artifact, validating the chart type if any
    pub fn file_name(&self) -> Result<String> {
        match self {
            Self::Info => Ok(INFO_FILE.to_string()),
            Self::Documentation => Ok(DOC_FILE.to_string()),
            Self::EquityChart(chart_type) => {
                validate_segment("chart type", chart_type)?;
                Ok(equity_chart_name(chart_type))
            }
        }
    }
}

impl std::fmt::Display for ArtifactKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Documentation => write!(f, "documentation"),
            Self::EquityChart(chart_type) => write!(f, "equity-chart[{}]", chart_type),
        }
    }
}

/// Reject anything that is not a single plain path segment.
pub fn validate_segment(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::MalformedInput(format!("{} must not be empty", what)));
    }
    if value == "." || value == ".." {
        return Err(Error::MalformedInput(format!(
            "{} '{}' is not a valid name",
            what, value
        )));
    }
    if value.contains(['/', '\\', '\0']) {
        return Err(Error::MalformedInput(format!(
            "{} '{}' contains a path separator",
            what,
            value.escape_default()
        )));
    }
    Ok(())
}

/// `{root}/{owner}/{id}`
pub fn entity_dir(root: &Path, owner: &str, id: u64) -> Result<PathBuf> {
    validate_segment("owner", owner)?;
    Ok(root.join(owner).join(id.to_string()))
}

/// `{root}/{owner}/{id}/{artifact file}`
pub fn artifact_path(root: &Path, owner: &str, id: u64, kind: ArtifactKind<'_>) -> Result<PathBuf> {
    let file_name = kind.file_name()?;
    Ok(entity_dir(root, owner, id)?.join(file_name))
}

/// `{target}.{pid}-{unique}.temp`, same directory as the target
///
/// Each write uses its own `unique` value, so concurrent writers of one
/// artifact never share a temp file.
pub fn temp_path(target: &Path, unique: u64) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(format!(".{}-{}{}", std::process::id(), unique, TEMP_SUFFIX));
    PathBuf::from(name)
}

/// Whether a file name belongs to an in-flight or abandoned write
pub fn is_temp_name(file_name: &str) -> bool {
    file_name.ends_with(TEMP_SUFFIX)
}

pub fn equity_chart_name(chart_type: &str) -> String {
    format!("{}{}", chart_type, EQUITY_CHART_SUFFIX)
}

/// Extract the chart type from a file name, if it is a chart artifact
pub fn chart_type_of(file_name: &str) -> Option<&str> {
    if is_temp_name(file_name) {
        return None;
    }
    file_name
        .strip_suffix(EQUITY_CHART_SUFFIX)
        .filter(|chart_type| !chart_type.is_empty())
}
