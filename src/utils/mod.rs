pub mod time;

/// Generates a long random identifier for events and records.
pub fn longid() -> String {
    nanoid::nanoid!(21)
}

/// Generates a unique case identifier.
pub fn case_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
