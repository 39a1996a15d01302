//! Output container: named directories of labelled category histograms,
//! persisted as JSON when the file is closed.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::category::CategoryMap;
use crate::error::Result;
use crate::histogram::Histogram;
use crate::sanitize::remove_neg_entries;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub histograms: IndexMap<String, Histogram>,
}

impl Directory {
    /// Stores `hist` under its own name, replacing any earlier histogram of that name.
    pub fn write(&mut self, hist: Histogram) {
        self.histograms.insert(hist.name.clone(), hist);
    }

    pub fn get(&self, name: &str) -> Option<&Histogram> {
        self.histograms.get(name)
    }

    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Container {
    directories: IndexMap<String, Directory>,
}

/// Handle on one output file. Nothing reaches disk until [`OutputFile::close`].
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    container: Container,
}

impl OutputFile {
    /// Starts a new, empty file at `path`, creating its parent directory.
    /// Any existing file at `path` is left untouched until [`OutputFile::close`].
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            container: Container::default(),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(Self {
            path: path.to_path_buf(),
            container: serde_json::from_reader(reader)?,
        })
    }

    /// Returns the directory `name`, creating it if needed.
    pub fn mkdir(&mut self, name: &str) -> &mut Directory {
        self.container.directories.entry(name.to_string()).or_default()
    }

    pub fn directory(&self, name: &str) -> Option<&Directory> {
        self.container.directories.get(name)
    }

    pub fn directory_names(&self) -> impl Iterator<Item = &str> {
        self.container.directories.keys().map(String::as_str)
    }

    /// Writes the container next to `path` and renames it into place, so a
    /// reader never sees a partial file.
    pub fn close(self) -> Result<()> {
        let mut partial = self.path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        {
            let mut writer = BufWriter::new(File::create(&partial)?);
            serde_json::to_writer_pretty(&mut writer, &self.container)?;
            writer.flush()?;
        }
        std::fs::rename(&partial, &self.path)?;
        tracing::info!(path = %self.path.display(), "wrote output file");
        Ok(())
    }
}

/// Copies the category bins of `hist_nano` into a histogram with one labelled
/// bin per entry of `categories`, in map order, and writes it as `name`.
///
/// Source bins are looked up by category value, so the layout of `hist_nano`
/// does not matter. MC histograms are sanitised before writing.
pub fn write_hist(
    dir: &mut Directory,
    hist_nano: &Histogram,
    categories: &CategoryMap,
    name: &str,
    is_mc: bool,
) -> Result<()> {
    let n_categories = categories.len();
    let mut hist = Histogram::new("hist", "hist", n_categories, 0.0, n_categories as f64)?;
    tracing::info!(histogram = name, "writing histogram");
    for (position, (&index, label)) in categories.iter().enumerate() {
        let bin = position + 1;
        let source_bin = hist_nano.find_bin(index as f64);
        let content = hist_nano.bin_content(source_bin);
        hist.set_bin_content(bin, content)?;
        hist.set_bin_error(bin, hist_nano.bin_error(source_bin))?;
        hist.set_bin_label(bin, label)?;
        tracing::debug!(index, bin, category = %label, content, "category bin");
    }

    if is_mc {
        remove_neg_entries(&mut hist)?;
    }
    hist.set_title(name);
    hist.set_name(name);
    dir.write(hist);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::dilepton_categories;
    use crate::sanitize::FLOOR_CONTENT;

    fn source_hist() -> Histogram {
        // category value 1 sits in bin 2 and value 2 in bin 3 of this layout
        let mut h = Histogram::new("category_nominal_index", "", 4, 0.0, 4.0).unwrap();
        h.set_bin_content(2, 10.0).unwrap();
        h.set_bin_error(2, 1.0).unwrap();
        h.set_bin_content(3, 20.0).unwrap();
        h.set_bin_error(3, 2.0).unwrap();
        h
    }

    #[test]
    fn bins_follow_category_order_and_labels() {
        let mut dir = Directory::default();
        write_hist(&mut dir, &source_hist(), &dilepton_categories(), "wjets", false).unwrap();
        let h = dir.get("wjets").unwrap();
        assert_eq!(h.n_bins, 2);
        assert_eq!(h.title, "wjets");
        assert_eq!((h.bin_content(1), h.bin_error(1)), (10.0, 1.0));
        assert_eq!((h.bin_content(2), h.bin_error(2)), (20.0, 2.0));
        assert_eq!(h.bin_label(1), Some("ql"));
        assert_eq!(h.bin_label(2), Some("q"));
    }

    #[test]
    fn reversed_map_reverses_bins() {
        let categories: CategoryMap = [(2, "q".to_string()), (1, "ql".to_string())].into_iter().collect();
        let mut dir = Directory::default();
        write_hist(&mut dir, &source_hist(), &categories, "data", false).unwrap();
        let h = dir.get("data").unwrap();
        assert_eq!(h.bin_content(1), 20.0);
        assert_eq!(h.bin_label(1), Some("q"));
    }

    #[test]
    fn mc_histograms_are_sanitised_and_data_is_not() {
        let mut empty = Histogram::new("category_nominal_index", "", 2, 0.5, 2.5).unwrap();
        empty.fill(1.0, -2.0);
        let mut dir = Directory::default();
        write_hist(&mut dir, &empty, &dilepton_categories(), "mc", true).unwrap();
        write_hist(&mut dir, &empty, &dilepton_categories(), "data", false).unwrap();
        assert_eq!(dir.get("mc").unwrap().bin_content(1), FLOOR_CONTENT);
        assert_eq!(dir.get("mc").unwrap().bin_content(2), FLOOR_CONTENT);
        assert_eq!(dir.get("data").unwrap().bin_content(1), -2.0);
        assert_eq!(dir.get("data").unwrap().bin_content(2), 0.0);
    }

    #[test]
    fn container_round_trips_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hists").join("wjets_mumu_D_2016.json");
        let mut file = OutputFile::create(&path).unwrap();
        let dir = file.mkdir("mumu_D");
        write_hist(dir, &source_hist(), &dilepton_categories(), "wjets", true).unwrap();
        file.close().unwrap();

        let reopened = OutputFile::open(&path).unwrap();
        assert_eq!(reopened.directory_names().collect::<Vec<_>>(), vec!["mumu_D"]);
        let dir = reopened.directory("mumu_D").unwrap();
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get("wjets").unwrap().bin_label(2), Some("q"));
        assert!(reopened.directory("ee_D").is_none());
    }

    #[test]
    fn unclosed_file_leaves_disk_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("hists").join("wjets_mumu_D_2016.json");
        let mut file = OutputFile::create(&path).unwrap();
        file.mkdir("mumu_D");
        drop(file);
        assert!(!path.exists());

        std::fs::write(&path, "{\"directories\": {}}").unwrap();
        let mut file = OutputFile::create(&path).unwrap();
        write_hist(file.mkdir("mumu_D"), &source_hist(), &dilepton_categories(), "wjets", true).unwrap();
        assert_eq!(OutputFile::open(&path).unwrap().directory_names().count(), 0);
        file.close().unwrap();
        assert_eq!(OutputFile::open(&path).unwrap().directory_names().count(), 1);
        assert_eq!(std::fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
