#[cfg(test)]
pub mod fixture_server;
