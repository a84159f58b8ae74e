// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::borrow::Cow;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Error, Result};

/// Class names, one per line; a detection's class id indexes this list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
    names: Vec<String>,
}

impl ClassCatalog {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::configuration(path, e))?;
        Self::parse(&text).map_err(|reason| Error::configuration(path, reason))
    }

    /// Lines are trimmed; blank lines in the middle keep their slot.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let names: Vec<String> = text.lines().map(|l| l.trim().to_string()).collect();
        if names.iter().all(|n| n.is_empty()) {
            return Err("class list is empty".to_string());
        }
        Ok(Self { names })
    }

    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Label for a class id, `class <id>` when the catalog has no entry.
    pub fn label(&self, id: usize) -> Cow<'_, str> {
        match self.get(id) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("class {}", id)),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// One color per class, drawn from a seeded RNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPalette {
    colors: Vec<[u8; 3]>,
}

impl ColorPalette {
    pub fn seeded(len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let colors = (0..len.max(1))
            .map(|_| [rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>()])
            .collect();
        Self { colors }
    }

    /// Ids past the palette wrap around.
    pub fn color(&self, id: usize) -> [u8; 3] {
        self.colors[id % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_trims_lines() {
        let catalog = ClassCatalog::parse("person\r\nbicycle \n car\n").unwrap();
        assert_eq!(catalog.names(), &["person", "bicycle", "car"]);
    }

    #[test]
    fn interior_blank_line_keeps_its_index() {
        let catalog = ClassCatalog::parse("person\n\ncar\n").unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(2), Some("car"));
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(ClassCatalog::parse("").is_err());
        assert!(ClassCatalog::parse("\n \n").is_err());
    }

    #[test]
    fn label_falls_back_for_unknown_ids() {
        let catalog = ClassCatalog::new(vec!["person".into()]);
        assert_eq!(catalog.label(0), "person");
        assert_eq!(catalog.label(7), "class 7");
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "person\nbicycle").unwrap();
        let catalog = ClassCatalog::from_path(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn from_path_missing_file_is_a_configuration_error() {
        let err = ClassCatalog::from_path("/nonexistent/coco.names").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn palette_is_reproducible_per_seed() {
        let a = ColorPalette::seeded(80, 7);
        let b = ColorPalette::seeded(80, 7);
        let c = ColorPalette::seeded(80, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 80);
    }

    #[test]
    fn palette_wraps_ids() {
        let p = ColorPalette::seeded(3, 1);
        assert_eq!(p.color(4), p.color(1));
    }
}
