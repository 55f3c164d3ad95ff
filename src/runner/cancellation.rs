//! Cancellation regions.
//!
//! Firing a task voids every token resident in its cancellation set. The
//! handler only ever touches places named by the set, and voiding an empty
//! place is a no-op.

use crate::runner::Marking;

/// Places of `set` that currently hold tokens, with the number of tokens removed
/// by cancelling them. Duplicate entries in `set` count once.
pub fn removable(
    set: &[String],
    marking: &Marking,
) -> (Vec<String>, usize) {
    let mut places: Vec<String> = Vec::new();
    let mut tokens = 0;
    for place in set.iter() {
        let count = marking.tokens(place);
        if count > 0 && !places.contains(place) {
            places.push(place.clone());
            tokens += count;
        }
    }
    (places, tokens)
}

/// Removes every token in a place named by `set` and returns exactly the
/// places that held one, in set order.
pub fn cancel(
    set: &[String],
    marking: &mut Marking,
) -> Vec<String> {
    let mut removed = Vec::new();
    for place in set.iter() {
        if marking.clear(place) > 0 {
            removed.push(place.clone());
        }
    }
    removed
}
