//! Random identifiers for new resources and requests.

use rand::Rng;

/// Lowercase alphanumerics without the easily confused `i`, `l`, `o`, `0`
/// and `1`.
pub const ID_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

pub const RESOURCE_ID_LEN: usize = 26;
pub const REQUEST_ID_LEN: usize = 13;

/// Default identifier for a newly created resource.
#[must_use]
pub fn generate_resource_id() -> String {
    random_id(RESOURCE_ID_LEN)
}

/// Identifier attached to a single request for log correlation.
#[must_use]
pub fn generate_request_id() -> String {
    random_id(REQUEST_ID_LEN)
}

fn random_id(len: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..len)
        .map(|_| char::from(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())]))
        .collect()
}

///
/// TESTS
///
