use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::utils::words;

lazy_static! {
    // Built-in definitions for the vocabulary the reading library leans on.
    // Unknown words still count as lookups; the learner just gets no gloss.
    static ref DEFINITIONS: HashMap<&'static str, &'static str> = {
        let mut table = HashMap::new();
        table.insert("vocabulary", "All the words a person knows or uses");
        table.insert("perspectives", "Particular ways of viewing things");
        table.insert("creativity", "The use of imagination to produce new ideas");
        table.insert("implement", "To put a plan or decision into effect");
        table.insert("consumption", "The using up of a resource");
        table.insert("renewable", "Able to be replaced naturally; not depleted when used");
        table.insert("collective", "Done by people acting as a group");
        table.insert("automation", "The use of machines to do work without people");
        table.insert("flexibility", "The willingness to change or adapt");
        table.insert("adaptability", "The quality of adjusting to new conditions");
        table.insert("unprecedented", "Never done or known before");
        table.insert("revolutionizing", "Changing something completely and fundamentally");
        table.insert("sophisticated", "Highly developed or complex");
        table.insert("algorithms", "Sets of rules a computer follows to solve problems");
        table.insert("congestion", "The state of being overcrowded, as with traffic");
        table.insert("phenomenon", "A fact or situation that is observed to happen");
        table.insert("initiative", "The ability to act before others do; a new plan");
        table.insert("sustainability", "Avoiding the depletion of natural resources");
        table.insert("infrastructure", "The basic systems a country or organization needs");
        table.insert("controversial", "Causing much public disagreement");
        table
    };
}

/// Looks up a word as displayed in an article; punctuation and case are
/// forgiven. Returns the canonical form and, when known, its definition.
pub fn lookup(word: &str) -> (String, Option<&'static str>) {
    let canonical = words::normalize(word);
    let definition = DEFINITIONS.get(canonical.as_str()).copied();
    (canonical, definition)
}
