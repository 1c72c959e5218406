use std::path::Path;

use anyhow::Result;

use crate::io::ReadAt;

use super::{ZipArchive, ZipEntry};

/// Indices of the file entries matching `extensions` and `max_depth`.
///
/// Directory entries are never returned. An entry's depth is the number of
/// `/` separators in its name, so `max_depth == 0` keeps top-level files only.
/// Extensions are compared case-insensitively and without the leading dot;
/// an empty list matches every file.
pub fn find_entries(entries: &[ZipEntry], extensions: &[&str], max_depth: usize) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !entry.is_directory)
        .filter(|(_, entry)| entry.name.matches('/').count() <= max_depth)
        .filter(|(_, entry)| {
            if extensions.is_empty() {
                return true;
            }
            let Some(ext) = Path::new(&entry.name).extension() else {
                return false;
            };
            let ext = ext.to_string_lossy().to_lowercase();
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
        .map(|(index, _)| index)
        .collect()
}

/// An ordered set of opened archives searched as one tree.
///
/// Earlier archives shadow later ones when they contain the same path.
pub struct ArchiveSet<R: ReadAt> {
    archives: Vec<ZipArchive<R>>,
}

impl<R: ReadAt> Default for ArchiveSet<R> {
    fn default() -> Self {
        Self { archives: Vec::new() }
    }
}

impl<R: ReadAt> ArchiveSet<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, archive: ZipArchive<R>) {
        self.archives.push(archive);
    }

    pub fn archives(&self) -> &[ZipArchive<R>] {
        &self.archives
    }

    /// First archive holding a file named exactly `path`, with the entry.
    pub fn find(&self, path: &str) -> Option<(&ZipArchive<R>, &ZipEntry)> {
        self.archives.iter().find_map(|archive| {
            archive
                .index_of(path)
                .map(|i| &archive.entries()[i])
                .filter(|entry| !entry.is_directory)
                .map(|entry| (archive, entry))
        })
    }

    /// Contents of `path` from the first archive holding it.
    pub async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self.find(path) {
            Some((archive, entry)) => Ok(Some(archive.read_to_vec(entry).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_by_depth_and_extension() {
        let entries: Vec<_> = [
            "readme.TXT",
            "pics/",
            "pics/card.png",
            "pics/field/bg.jpg",
            "deck/main.ydk",
            "noext",
        ]
        .into_iter()
        .map(ZipEntry::named)
        .collect();

        assert_eq!(find_entries(&entries, &[], 0), vec![0, 5]);
        assert_eq!(find_entries(&entries, &[], 1), vec![0, 2, 4, 5]);
        assert_eq!(find_entries(&entries, &["png", ".jpg"], 2), vec![2, 3]);
        assert_eq!(find_entries(&entries, &["txt"], 5), vec![0]);
    }
}
