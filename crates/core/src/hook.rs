//! Ref updates as git hands them to `pre-receive` and `update` hooks.

use std::fmt;

/// One `<old> <new> <refname>` update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUpdate {
    pub old: String,
    pub new: String,
    pub refname: String,
}

impl RefUpdate {
    pub fn new(old: impl Into<String>, new: impl Into<String>, refname: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            refname: refname.into(),
        }
    }

    /// Parse a `pre-receive` stdin line. Returns `None` for anything that is
    /// not exactly three whitespace-separated fields.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let old = fields.next()?;
        let new = fields.next()?;
        let refname = fields.next()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self::new(old, new, refname))
    }

    /// The ref is being created.
    pub fn is_create(&self) -> bool {
        is_zero_id(&self.old)
    }

    /// The ref is being deleted.
    pub fn is_delete(&self) -> bool {
        is_zero_id(&self.new)
    }

    /// The ref is a local branch.
    pub fn is_branch(&self) -> bool {
        self.refname.starts_with("refs/heads/")
    }
}

impl fmt::Display for RefUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.old, self.new, self.refname)
    }
}

/// Git spells "no object" as an all-zero id (40 or 64 characters).
fn is_zero_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b == b'0')
}
