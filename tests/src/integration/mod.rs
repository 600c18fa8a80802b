//! Cross-component scenarios.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod lifecycle;

#[cfg(test)]
mod recovery;

#[cfg(test)]
mod security;
