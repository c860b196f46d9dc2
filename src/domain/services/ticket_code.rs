use rand::Rng;

use crate::domain::ports::TicketCodeGenerator;

/// Uppercase letters and digits minus the look-alikes 0/O and 1/I.
pub const TICKET_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const TICKET_CODE_PREFIX: &str = "EVT";

const FIRST_GROUP_LEN: usize = 6;
const SECOND_GROUP_LEN: usize = 4;

#[derive(Default)]
pub struct RandomTicketCodeGenerator;

impl RandomTicketCodeGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl TicketCodeGenerator for RandomTicketCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let mut group = |len: usize| -> String {
            (0..len)
                .map(|_| TICKET_CODE_ALPHABET[rng.gen_range(0..TICKET_CODE_ALPHABET.len())] as char)
                .collect()
        };
        let first = group(FIRST_GROUP_LEN);
        let second = group(SECOND_GROUP_LEN);
        format!("{TICKET_CODE_PREFIX}-{first}-{second}")
    }
}

/// Shape check used before hitting the store with a user-supplied code.
pub fn is_well_formed_code(code: &str) -> bool {
    let mut parts = code.split('-');
    let (Some(prefix), Some(first), Some(second), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    let in_alphabet = |s: &str| s.bytes().all(|b| TICKET_CODE_ALPHABET.contains(&b));
    prefix == TICKET_CODE_PREFIX
        && first.len() == FIRST_GROUP_LEN
        && second.len() == SECOND_GROUP_LEN
        && in_alphabet(first)
        && in_alphabet(second)
}

/// Lookup pointer for a code. Holding the code is enough to resolve it.
pub fn qr_url_for(base_url: &str, code: &str) -> String {
    format!("{}/api/v1/tickets/qr?code={}", base_url.trim_end_matches('/'), code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn codes_have_expected_shape() {
        let generator = RandomTicketCodeGenerator::new();
        for _ in 0..1_000 {
            let code = generator.generate();
            assert_eq!(code.len(), 15, "{code}");
            assert!(code.starts_with("EVT-"));
            assert!(is_well_formed_code(&code), "{code}");
            assert!(!code[4..].contains(&['0', 'O', '1', 'I'][..]));
        }
    }

    #[test]
    fn no_collisions_across_100k_codes() {
        let generator = RandomTicketCodeGenerator::new();
        let codes: HashSet<String> = (0..100_000).map(|_| generator.generate()).collect();
        assert_eq!(codes.len(), 100_000);
    }

    #[test]
    fn rejects_malformed_codes() {
        assert!(is_well_formed_code("EVT-ABCDEF-2345"));
        assert!(!is_well_formed_code("EVT-ABCDE0-2345"));
        assert!(!is_well_formed_code("EVT-ABCDEF-234"));
        assert!(!is_well_formed_code("TIX-ABCDEF-2345"));
        assert!(!is_well_formed_code("EVT-ABCDEF-2345-XX"));
        assert!(!is_well_formed_code("evt-abcdef-2345"));
    }

    #[test]
    fn qr_url_is_derived_from_code() {
        assert_eq!(
            qr_url_for("https://portal.example.org/", "EVT-ABCDEF-2345"),
            "https://portal.example.org/api/v1/tickets/qr?code=EVT-ABCDEF-2345"
        );
    }
}
