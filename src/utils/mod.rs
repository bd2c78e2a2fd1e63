/// Standard content types
pub mod content_type {
    pub const APPLICATION_JSON: &str = "application/json";
    pub const HAL_JSON: &str = "application/hal+json";
}

#[cfg(test)]
pub(crate) mod mock;
