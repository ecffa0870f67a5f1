use std::path::Path;
use std::sync::Arc;

use crate::errors::{ClassifierError, ClassifierResult};

/// Labels the stock model was trained on, in output order.
pub const DEFAULT_LABELS: [&str; 7] =
    ["carrot", "eggplant", "peas", "potato", "sweetcorn", "tomato", "turnip"];

/// Ordered class label table.
///
/// Position `i` names the `i`-th score emitted by the model. The table is
/// immutable and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels(Arc<[String]>);

impl ClassLabels {
    pub fn new<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> ClassifierResult<ClassLabels> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(ClassifierError::config("label table is empty"));
        }
        for (ix, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(ClassifierError::config(format!("label #{ix} is blank")));
            }
            if labels[..ix].contains(label) {
                return Err(ClassifierError::config(format!("duplicate label {label:?}")));
            }
        }
        Ok(ClassLabels(labels.into()))
    }

    /// Reads a labels file, one label per line. Blank lines are skipped.
    pub fn from_path(path: impl AsRef<Path>) -> ClassifierResult<ClassLabels> {
        let content = std::fs::read_to_string(path.as_ref())?;
        ClassLabels::new(content.lines().map(str::trim).filter(|l| !l.is_empty()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, ix: usize) -> Option<&str> {
        self.0.get(ix).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }
}

impl Default for ClassLabels {
    fn default() -> ClassLabels {
        ClassLabels(DEFAULT_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

impl std::ops::Index<usize> for ClassLabels {
    type Output = str;
    fn index(&self, ix: usize) -> &str {
        &self.0[ix]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_order() {
        let labels = ClassLabels::default();
        assert_eq!(labels.len(), 7);
        assert_eq!(&labels[0], "carrot");
        assert_eq!(&labels[6], "turnip");
        assert_eq!(labels.get(7), None);
    }

    #[test]
    fn rejects_empty_and_duplicates() {
        assert!(ClassLabels::new(Vec::<String>::new()).is_err());
        assert!(ClassLabels::new(["peas", "peas"]).is_err());
        assert!(ClassLabels::new(["peas", " "]).is_err());
    }

    #[test]
    fn labels_file() -> ClassifierResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "onion\n\n  leek \ngarlic\n")?;
        let labels = ClassLabels::from_path(&path)?;
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["onion", "leek", "garlic"]);
        Ok(())
    }
}
