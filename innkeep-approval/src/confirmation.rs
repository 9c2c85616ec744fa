use uuid::Uuid;

pub const PREFIX: &str = "CNF";
const TAG_LEN: usize = 4;

/// Generate a confirmation number for an approved booking.
///
/// Format: `CNF-{TAG}-{RAND}`. `TAG` is the last four alphanumerics of the
/// booking id (upper-cased, left-padded with `0`) so operators can match a
/// confirmation to its booking at a glance. `RAND` is 32 random bits from a
/// v4 UUID as eight upper-case hex digits.
pub fn generate(booking_id: &str) -> String {
    generate_with(booking_id, Uuid::new_v4())
}

fn generate_with(booking_id: &str, entropy: Uuid) -> String {
    let random = (entropy.as_u128() >> 96) as u32;
    format!("{}-{}-{:08X}", PREFIX, tag(booking_id), random)
}

fn tag(booking_id: &str) -> String {
    let alnum: Vec<char> = booking_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let tail: String = alnum[alnum.len().saturating_sub(TAG_LEN)..].iter().collect();
    format!("{:0>width$}", tail, width = TAG_LEN)
}

/// Whether `value` has the shape produced by [`generate`].
pub fn is_well_formed(value: &str) -> bool {
    let mut parts = value.split('-');
    let (Some(prefix), Some(tag), Some(random), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    prefix == PREFIX
        && tag.len() == TAG_LEN
        && tag.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        && random.len() == 8
        && random.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
}
