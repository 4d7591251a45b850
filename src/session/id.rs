/// Source of meeting identifiers
///
/// Every upload asks for exactly one id, which then names the sound
/// directory, the results directory and the tracking URL.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 ids in hyphenated form (36 characters)
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
