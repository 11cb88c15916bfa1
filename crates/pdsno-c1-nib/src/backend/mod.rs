pub mod memory;
pub mod rocks;

/// Namespace prefixes shared by every backend for deriving lock/counter keys
/// consistently (spec §4.1 resource_key convention: `"<kind>:<id>"`).
pub mod keys {
    pub fn device(id: &str) -> String {
        format!("device:{id}")
    }
    pub fn controller(id: &str) -> String {
        format!("controller:{id}")
    }
}
