pub mod time;

/// Generates a new run id.
pub fn longid() -> String {
    nanoid::nanoid!()
}
