use serde::Serialize;

/// Normalized allergen list.
///
/// Entries are trimmed, and empty or `none` entries never survive
/// construction, whichever upstream shape they arrived in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Allergens(Vec<String>);

impl Allergens {
    /// Builds from a comma separated string, e.g. `"Milk, Soy, None"`.
    pub fn from_delimited(raw: &str) -> Self {
        Self::from_iter(raw.split(','))
    }

    /// Builds from an already split list.
    pub fn from_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_iter(items)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Allergens {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let items = iter
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
            .collect();
        Self(items)
    }
}
