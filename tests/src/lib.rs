#[cfg(test)]
mod types;
