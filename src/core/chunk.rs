//! Retrieval chunk representation and department metadata.
//!
//! Chunks are the leaf unit of retrieval: section-aware spans of policy
//! documents produced by ingestion. Each chunk carries the metadata the
//! search and agent layers need to cite it.

use serde::{Deserialize, Serialize};

/// A corpus department. Derived deterministically from the policy
/// filename at ingestion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    /// Human resources: benefits, leave, policies.
    #[serde(rename = "HR")]
    Hr,
    /// Information technology: accounts, hardware, access.
    #[serde(rename = "IT")]
    It,
    /// Security: compliance, training, incidents.
    Security,
    /// Finance: payroll, expenses, travel.
    Finance,
    /// Catch-all for documents without a department prefix.
    General,
}

impl Department {
    /// All corpus departments, in classifier label order.
    pub const ALL: [Self; 5] = [
        Self::Finance,
        Self::General,
        Self::Hr,
        Self::It,
        Self::Security,
    ];

    /// Returns the canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hr => "HR",
            Self::It => "IT",
            Self::Security => "Security",
            Self::Finance => "Finance",
            Self::General => "General",
        }
    }

    /// Parses a wire name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "hr" => Some(Self::Hr),
            "it" => Some(Self::It),
            "security" => Some(Self::Security),
            "finance" => Some(Self::Finance),
            "general" => Some(Self::General),
            _ => None,
        }
    }

    /// Derives the department from a policy filename prefix.
    ///
    /// `hr_*` → HR, `it_*` → IT, `security_*` → Security,
    /// `finance_*` → Finance; anything else is General.
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        if lower.starts_with("hr_") {
            Self::Hr
        } else if lower.starts_with("it_") {
            Self::It
        } else if lower.starts_with("security_") {
            Self::Security
        } else if lower.starts_with("finance_") {
            Self::Finance
        } else {
            Self::General
        }
    }
}

impl std::fmt::Display for Department {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A section-aware span of a policy document.
///
/// Immutable once written; destroyed only when the collection is reset.
/// The `chunk_id` is stable (`"<filename>_<ordinal>"`) and unique within
/// the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identifier: `"<filename>_<ordinal>"`.
    pub chunk_id: String,
    /// Chunk text. At most `chunk_size` characters.
    pub text: String,
    /// Source filename (e.g. `hr_policies.md`).
    pub filename: String,
    /// Title of the markdown section this chunk came from.
    pub section_title: String,
    /// Department derived from the filename.
    pub department: Department,
    /// Zero-based position within the source file's chunk sequence.
    pub ordinal: usize,
}

impl DocumentChunk {
    /// Creates a new chunk, deriving `chunk_id` from filename and ordinal.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        section_title: impl Into<String>,
        text: impl Into<String>,
        ordinal: usize,
    ) -> Self {
        let filename = filename.into();
        Self {
            chunk_id: format!("{filename}_{ordinal}"),
            text: text.into(),
            department: Department::from_filename(&filename),
            filename,
            section_title: section_title.into(),
            ordinal,
        }
    }

    /// Returns the size of the chunk text in characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Checks if the chunk text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns the source descriptor used in answer citations.
    #[must_use]
    pub fn source(&self) -> ChunkSource {
        ChunkSource {
            document: self.filename.clone(),
            section: self.section_title.clone(),
            department: self.department,
        }
    }
}

/// Citation metadata for a chunk: where the answer text came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSource {
    /// Source document filename.
    pub document: String,
    /// Section title within the document.
    pub section: String,
    /// Owning department.
    pub department: Department,
}
