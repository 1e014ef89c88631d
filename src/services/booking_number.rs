use chrono::NaiveDateTime;
use rand::Rng;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 4;

/// `BB-<YYYYMMDD>-<4 base36 chars>`. Not unique by construction: the
/// `bookings.booking_number` unique index is the authority and callers retry.
pub fn generate_booking_number(now: NaiveDateTime) -> String {
    generate_booking_number_with(now, &mut rand::thread_rng())
}

pub fn generate_booking_number_with<R: Rng + ?Sized>(now: NaiveDateTime, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    format!("BB-{}-{suffix}", now.format("%Y%m%d"))
}
