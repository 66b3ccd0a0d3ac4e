#![no_main]

//! Fuzz target for remote URL normalization
//!
//! Identity derivation runs on whatever a user put in their git config.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use self_review_git::RepoIdentity;
use self_review_git::identity::{normalize_remote, remote_in_org};

#[derive(Arbitrary, Debug)]
struct RemoteInput {
    url: String,
    org: String,
}

fuzz_target!(|input: RemoteInput| {
    let normalized = normalize_remote(&input.url);
    assert_eq!(normalized, normalized.to_lowercase());

    let identity = RepoIdentity::from_remote(&input.url);
    let _ = identity.short_name();
    let _ = remote_in_org(&input.url, &input.org);
});
