//! Migration script filename parsing.
//!
//! A migration script is named `NN_NN_NNNN_<description>.<ext>`, for example
//! `04_00_0100_add_vm_table.sql`. The three numeric groups form the ordinal
//! key, which must be unique among all scripts in the watched folder.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::NotAMigrationScript;

const FILE_PATTERN: &str = r"^(\d{2})_(\d{2})_(\d{4})_([^/]+)\.(sql|sh)$";

fn file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(FILE_PATTERN).expect("migration filename pattern is valid"))
}

/// Extensions a migration script may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScriptExtension {
    Sql,
    Shell,
}

impl ScriptExtension {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "sql" => Some(Self::Sql),
            "sh" => Some(Self::Shell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Shell => "sh",
        }
    }
}

impl fmt::Display for ScriptExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filename that matched the migration script pattern.
///
/// Ordering and equality are by full filename, so a [`FileSet`] keeps two
/// scripts that share an ordinal key but differ in description. Serialized
/// as the bare filename; deserializing goes through [`parse`](Self::parse).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MigrationFilename {
    filename: String,
    ordinal_key: String,
    description: String,
    extension: ScriptExtension,
}

impl MigrationFilename {
    /// Parse a bare filename. Returns `None` for anything that is not a
    /// migration script, including names with directory components.
    pub fn parse(name: &str) -> Option<Self> {
        let caps = file_pattern().captures(name)?;
        let extension = ScriptExtension::from_suffix(&caps[5])?;
        Some(Self {
            filename: name.to_string(),
            ordinal_key: format!("{}_{}_{}", &caps[1], &caps[2], &caps[3]),
            description: caps[4].to_string(),
            extension,
        })
    }

    /// Parse the last component of a `/`-separated repository path.
    pub fn from_path(path: &str) -> Option<Self> {
        let basename = path.rsplit('/').next().unwrap_or(path);
        Self::parse(basename)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The `NN_NN_NNNN` sequence slot this script claims.
    pub fn ordinal_key(&self) -> &str {
        &self.ordinal_key
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn extension(&self) -> ScriptExtension {
        self.extension
    }
}

impl fmt::Display for MigrationFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename)
    }
}

impl TryFrom<String> for MigrationFilename {
    type Error = NotAMigrationScript;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::parse(&name).ok_or(NotAMigrationScript(name))
    }
}

impl From<MigrationFilename> for String {
    fn from(script: MigrationFilename) -> Self {
        script.filename
    }
}

/// Migration scripts, unique by filename and iterated in filename order.
pub type FileSet = BTreeSet<MigrationFilename>;

/// Parse every path and keep only the migration scripts.
pub fn collect_scripts<I, S>(paths: I) -> FileSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    paths
        .into_iter()
        .filter_map(|p| MigrationFilename::from_path(p.as_ref()))
        .collect()
}

/// Number of scripts claiming each ordinal key, keyed in ordinal order.
/// A count above one means the ordinal is already used more than once.
pub fn ordinal_usage(scripts: &FileSet) -> BTreeMap<&str, usize> {
    let mut usage = BTreeMap::new();
    for script in scripts {
        *usage.entry(script.ordinal_key()).or_default() += 1;
    }
    usage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sql_script() {
        let f = MigrationFilename::parse("04_00_0100_add_vm_table.sql").unwrap();
        assert_eq!(f.ordinal_key(), "04_00_0100");
        assert_eq!(f.description(), "add_vm_table");
        assert_eq!(f.extension(), ScriptExtension::Sql);
        assert_eq!(f.filename(), "04_00_0100_add_vm_table.sql");
    }

    #[test]
    fn test_parse_shell_script() {
        let f = MigrationFilename::parse("03_06_0210_fix_permissions.sh").unwrap();
        assert_eq!(f.ordinal_key(), "03_06_0210");
        assert_eq!(f.extension(), ScriptExtension::Shell);
    }

    #[test]
    fn test_description_may_contain_dots_and_dashes() {
        let f = MigrationFilename::parse("04_01_0010_v4.1-cleanup.sql").unwrap();
        assert_eq!(f.description(), "v4.1-cleanup");
    }

    #[test]
    fn test_non_scripts_are_rejected() {
        for name in [
            "readme.txt",
            "",
            "04_00_0100.sql",
            "04_00_0100_.sql",
            "4_00_0100_short.sql",
            "04_00_100_short.sql",
            "04_00_01000_long.sql",
            "04-00-0100_dashes.sql",
            "04_00_0100_wrong.py",
            "04_00_0100_no_extension",
            "04_00_0100_upper.SQL",
            "x04_00_0100_prefixed.sql",
            "04_00_0100_trailing.sql.orig",
            "upgrade/04_00_0100_nested.sql",
            "common_sp.sql",
        ] {
            assert!(
                MigrationFilename::parse(name).is_none(),
                "{:?} should not parse",
                name
            );
        }
    }

    #[test]
    fn test_serde_goes_through_parse() {
        let f = MigrationFilename::parse("04_00_0100_add_vm_table.sql").unwrap();
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(json, r#""04_00_0100_add_vm_table.sql""#);

        let back: MigrationFilename = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
        assert_eq!(back.ordinal_key(), "04_00_0100");
    }

    #[test]
    fn test_non_script_does_not_deserialize() {
        assert!(serde_json::from_str::<MigrationFilename>(r#""readme.txt""#).is_err());

        // A hand-built record cannot pair a foreign name with an ordinal.
        let forged = r#"{"filename":"readme.txt","ordinal_key":"99_99_9999","description":"","extension":"sql"}"#;
        assert!(serde_json::from_str::<MigrationFilename>(forged).is_err());

        assert_eq!(
            MigrationFilename::try_from("notes.md".to_string()),
            Err(NotAMigrationScript("notes.md".into()))
        );
    }

    #[test]
    fn test_from_path_uses_basename() {
        let f = MigrationFilename::from_path("packaging/dbscripts/upgrade/04_00_0100_a.sql").unwrap();
        assert_eq!(f.filename(), "04_00_0100_a.sql");
        assert!(MigrationFilename::from_path("packaging/dbscripts/upgrade/pre_upgrade/readme").is_none());
    }

    #[test]
    fn test_ordinal_usage_counts_shared_keys() {
        let set = collect_scripts([
            "04_00_0110_b.sh",
            "04_00_0100_init.sql",
            "04_00_0110_a.sql",
            "04_00_0120_c.sql",
            "04_00_0110_c.sql",
        ]);
        let usage = ordinal_usage(&set);
        let counts: Vec<(&str, usize)> = usage.into_iter().collect();
        assert_eq!(
            counts,
            vec![("04_00_0100", 1), ("04_00_0110", 3), ("04_00_0120", 1)]
        );

        assert!(ordinal_usage(&FileSet::new()).is_empty());
    }

    #[test]
    fn test_file_set_keeps_same_ordinal_different_names() {
        let set = collect_scripts([
            "04_00_0100_a.sql",
            "04_00_0100_b.sql",
            "04_00_0100_a.sql",
            "notes.md",
        ]);
        let names: Vec<&str> = set.iter().map(|f| f.filename()).collect();
        assert_eq!(names, vec!["04_00_0100_a.sql", "04_00_0100_b.sql"]);
    }
}
