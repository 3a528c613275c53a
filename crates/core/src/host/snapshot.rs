//! Serializable snapshot of a disassembly database.
//!
//! Snapshots are the interchange format for the bundled hosts: they can be
//! written by an exporter script inside a disassembler, loaded into an
//! [`InMemoryDatabase`](super::InMemoryDatabase) or imported into a
//! [`SqliteDatabase`](crate::db::SqliteDatabase).

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::host::strings::PASCAL_MAX_LEN;
use crate::model::{Address, CommentSlot, Function, Segment, StringType, Xref};

fn default_true() -> bool {
    true
}

fn default_item_size() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Whether the producing disassembler had finished auto-analysis.
    #[serde(default = "default_true")]
    pub analysis_complete: bool,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub items: Vec<ItemEntry>,
    #[serde(default)]
    pub xrefs: Vec<Xref>,
    #[serde(default)]
    pub comments: Vec<CommentEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            analysis_complete: true,
            segments: Vec::new(),
            functions: Vec::new(),
            items: Vec::new(),
            xrefs: Vec::new(),
            comments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Code,
    Data,
    String,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Code => "code",
            ItemKind::Data => "data",
            ItemKind::String => "string",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "code" => Some(ItemKind::Code),
            "data" => Some(ItemKind::Data),
            "string" => Some(ItemKind::String),
            _ => None,
        }
    }
}

/// String literal contents as readable text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringEntry {
    #[serde(rename = "type")]
    pub string_type: StringType,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    pub address: Address,
    #[serde(default = "default_item_size")]
    pub size: u64,
    pub kind: ItemKind,
    /// Present for `kind: string`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<StringEntry>,
}

/// Comment stored at an address. Function comments use `slot: function`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntry {
    pub address: Address,
    pub slot: CommentSlot,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
}

impl SnapshotFormat {
    /// `.yaml`/`.yml` select YAML; anything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => SnapshotFormat::Yaml,
            _ => SnapshotFormat::Json,
        }
    }
}

impl Snapshot {
    pub fn parse(body: &str, format: SnapshotFormat) -> Result<Self> {
        let snapshot = match format {
            SnapshotFormat::Json => {
                serde_json::from_str::<Self>(body).context("Failed to parse snapshot JSON")?
            }
            SnapshotFormat::Yaml => {
                serde_yaml::from_str::<Self>(body).context("Failed to parse snapshot YAML")?
            }
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Reject contents that cannot be laid out as the binary would hold them.
    pub fn validate(&self) -> Result<()> {
        for item in &self.items {
            if let Some(entry) = &item.string {
                if entry.string_type == StringType::Pascal && entry.text.len() > PASCAL_MAX_LEN {
                    bail!(
                        "Pascal string at {:#x} is {} bytes; the length prefix allows at most {}",
                        item.address,
                        entry.text.len(),
                        PASCAL_MAX_LEN
                    );
                }
            }
        }
        Ok(())
    }

    pub fn render(&self, format: SnapshotFormat) -> Result<String> {
        let body = match format {
            SnapshotFormat::Json => serde_json::to_string_pretty(self)?,
            SnapshotFormat::Yaml => serde_yaml::to_string(self)?,
        };
        Ok(body)
    }

    /// Load a snapshot, returning it with the SHA-256 of the file contents.
    pub fn load(path: &Path) -> Result<(Self, String)> {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot at {}", path.display()))?;
        let snapshot = Self::parse(&body, SnapshotFormat::from_path(path))
            .with_context(|| format!("Invalid snapshot {}", path.display()))?;
        Ok((snapshot, sha256_bytes(body.as_bytes())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let body = self.render(SnapshotFormat::from_path(path))?;
        std::fs::write(path, body)
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        Ok(())
    }
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
