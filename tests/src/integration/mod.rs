//! Cross-crate flows driven over HTTP.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod pull_flows;
#[cfg(test)]
mod push_flows;
