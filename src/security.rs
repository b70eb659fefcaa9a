use rand::distributions::Alphanumeric;
use rand::Rng;
use subtle::ConstantTimeEq;

/// Prefix of every generated read-API secret.
pub const API_KEY_PREFIX: &str = "trn_";

const SEGMENT_LEN: usize = 13;

/// Constant-time string comparison to prevent timing attacks
/// Use this for comparing API keys and other bearer secrets
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn random_segment<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(SEGMENT_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Generate a read-API secret of the form `trn_<13 alnum>_<13 alnum>`.
pub fn generate_api_key() -> String {
    let mut rng = rand::thread_rng();
    let first = random_segment(&mut rng);
    let second = random_segment(&mut rng);
    format!("{}{}_{}", API_KEY_PREFIX, first, second)
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn parse_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
