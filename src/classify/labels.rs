use anyhow::{anyhow, Result};

/// The food categories the bundled model was trained on, in output order.
pub const FOOD_LABELS: [&str; 12] = [
    "Apple",
    "Chapati",
    "Chicken Gravy",
    "Fries",
    "Idli",
    "Pizza",
    "Rice",
    "Soda",
    "Tomato",
    "Vada",
    "Banana",
    "Hamburger",
];

/// Closed, ordered set of class labels. Fixed for the process lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(anyhow!("label set must not be empty"));
        }
        for (i, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(anyhow!("label {} is blank", i));
            }
            if labels[..i].contains(label) {
                return Err(anyhow!("duplicate label '{}'", label));
            }
        }
        Ok(Self { labels })
    }

    pub fn food() -> Self {
        Self {
            labels: FOOD_LABELS.iter().map(|label| label.to_string()).collect(),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|known| known == label)
    }

    /// Label at a model output index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::food()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn food_labels_are_the_twelve_categories() {
        let labels = LabelSet::food();
        assert_eq!(labels.len(), 12);
        assert_eq!(labels.get(0), Some("Apple"));
        assert_eq!(labels.get(11), Some("Hamburger"));
        assert!(labels.contains("Chicken Gravy"));
        assert!(!labels.contains("apple"));
        assert_eq!(labels.get(12), None);
    }

    #[test]
    fn custom_label_sets_reject_duplicates_and_blanks() {
        assert!(LabelSet::new(vec![]).is_err());
        assert!(LabelSet::new(vec!["Rice".into(), "Rice".into()]).is_err());
        assert!(LabelSet::new(vec!["Rice".into(), " ".into()]).is_err());
        assert!(LabelSet::new(vec!["Rice".into(), "Soda".into()]).is_ok());
    }
}
