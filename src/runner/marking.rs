use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Token counts per place of one case.
///
/// Places are condition ids, or task ids for multi-instance tasks holding
/// their busy token. Empty places are not stored, so two markings with the
/// same tokens compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marking {
    tokens: BTreeMap<String, usize>,
}

impl Marking {
    pub fn new() -> Self {
        Self::default()
    }

    /// A marking with one token on `place`.
    pub fn seeded(place: &str) -> Self {
        let mut marking = Self::new();
        marking.add(place, 1);
        marking
    }

    pub fn tokens(
        &self,
        place: &str,
    ) -> usize {
        self.tokens.get(place).copied().unwrap_or(0)
    }

    pub fn is_marked(
        &self,
        place: &str,
    ) -> bool {
        self.tokens(place) > 0
    }

    pub fn add(
        &mut self,
        place: &str,
        count: usize,
    ) {
        if count > 0 {
            *self.tokens.entry(place.to_string()).or_insert(0) += count;
        }
    }

    /// Removes one token from `place`; false if it held none.
    pub fn remove(
        &mut self,
        place: &str,
    ) -> bool {
        match self.tokens.get_mut(place) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.tokens.remove(place);
                true
            }
            None => false,
        }
    }

    /// Removes every token from `place` and returns how many there were.
    pub fn clear(
        &mut self,
        place: &str,
    ) -> usize {
        self.tokens.remove(place).unwrap_or(0)
    }

    /// Total number of tokens over all places.
    pub fn total(&self) -> usize {
        self.tokens.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Marked places with their counts, ordered by place id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.tokens.iter().map(|(place, count)| (place.as_str(), *count))
    }

    /// Marked places ordered by id.
    pub fn places(&self) -> impl Iterator<Item = &str> {
        self.tokens.keys().map(String::as_str)
    }

    /// True if `place` is marked and holds every token of the marking.
    pub fn holds_only(
        &self,
        place: &str,
    ) -> bool {
        self.is_marked(place) && self.tokens.len() == 1
    }
}

impl FromIterator<(String, usize)> for Marking {
    fn from_iter<I: IntoIterator<Item = (String, usize)>>(iter: I) -> Self {
        let mut marking = Self::new();
        for (place, count) in iter {
            marking.add(&place, count);
        }
        marking
    }
}
