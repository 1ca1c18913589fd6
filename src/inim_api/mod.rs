pub mod cached_inim_client;
pub mod inim_client;
pub mod models;

#[cfg(test)]
pub(crate) mod test_support;
