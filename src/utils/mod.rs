pub mod response;

#[cfg(test)]
pub mod stub;
