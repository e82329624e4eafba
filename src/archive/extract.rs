use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::archive::error::{ArchiveError, Result};
use crate::archive::index::MetadataIndex;
use crate::archive::ArticleId;

/// Unpacks the archive members a review session needs into a scratch
/// directory, so the viewer can treat content as plain local files.
///
/// The scratch area lives for one session; `cleanup` removes it best-effort
/// at session end.
pub struct Materializer {
    pdf_dir: PathBuf,
    scratch: PathBuf,
}

impl Materializer {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        let root = archive_root.into();
        Self {
            pdf_dir: root.join("PDF"),
            scratch: root.join("temp"),
        }
    }

    /// Where an extracted member ends up on disk.
    pub fn scratch_path(&self, member: &str) -> PathBuf {
        self.scratch.join(member)
    }

    /// Extract every PDF member referenced by `ids`. Each distinct archive is
    /// opened once and only the requested members are unpacked. Records
    /// without a PDF pointer fall back to text display and are skipped here.
    /// A missing archive or member aborts the run: continuing would leave the
    /// viewer out of sync with the metadata.
    pub fn unpack_pdfs(&self, ids: &[ArticleId], index: &MetadataIndex) -> Result<usize> {
        let mut by_archive: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for id in ids {
            if let Some(pdf) = index.get(*id).and_then(|record| record.pdf.as_ref()) {
                by_archive
                    .entry(pdf.archive.as_str())
                    .or_default()
                    .insert(pdf.member.as_str());
            }
        }

        let mut extracted = 0usize;
        for (&archive_name, members) in &by_archive {
            let path = self.pdf_dir.join(archive_name);
            let mut archive = open_archive(&path)?;
            for &member in members {
                self.extract_member(&mut archive, archive_name, member)?;
                extracted += 1;
            }
        }

        tracing::info!(
            "Unpacked {extracted} pdf members into {}",
            self.scratch.display()
        );
        Ok(extracted)
    }

    fn extract_member(
        &self,
        archive: &mut ZipArchive<File>,
        archive_name: &str,
        member: &str,
    ) -> Result<()> {
        let mut entry = archive.by_name(member).map_err(|e| match e {
            ZipError::FileNotFound => ArchiveError::MissingEntry {
                archive: archive_name.to_string(),
                member: member.to_string(),
            },
            other => ArchiveError::ArchiveOpen {
                archive: PathBuf::from(archive_name),
                source: other,
            },
        })?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(ArchiveError::UnsafeEntry {
                member: member.to_string(),
            });
        };
        let target = self.scratch.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        Ok(())
    }

    /// Best-effort removal of the scratch area. Individual failures are
    /// reported and skipped, never raised.
    pub fn cleanup(&self) {
        let entries = match fs::read_dir(&self.scratch) {
            Ok(entries) => entries,
            // Nothing was ever extracted.
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let child = entry.path();
            let removed = if child.is_dir() {
                fs::remove_dir_all(&child)
            } else {
                fs::remove_file(&child)
            };
            if let Err(e) = removed {
                tracing::warn!("Failed to delete {}: {e}", child.display());
            }
        }
        if let Err(e) = fs::remove_dir(&self.scratch) {
            tracing::warn!("Failed to delete {}: {e}", self.scratch.display());
        }
    }
}

pub fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| ArchiveError::ArchiveOpen {
        archive: path.to_path_buf(),
        source: ZipError::Io(e),
    })?;
    ZipArchive::new(file).map_err(|e| ArchiveError::ArchiveOpen {
        archive: path.to_path_buf(),
        source: e,
    })
}

/// Read one member of an open archive into a UTF-8 string.
pub fn read_member_to_string(
    archive: &mut ZipArchive<File>,
    archive_name: &str,
    member: &str,
) -> Result<String> {
    let mut entry = archive.by_name(member).map_err(|e| match e {
        ZipError::FileNotFound => ArchiveError::MissingEntry {
            archive: archive_name.to_string(),
            member: member.to_string(),
        },
        other => ArchiveError::ArchiveOpen {
            archive: PathBuf::from(archive_name),
            source: other,
        },
    })?;
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(text)
}
