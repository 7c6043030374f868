/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use proptest::prelude::*;
use vibehunter::dedup::filter_novel;
use vibehunter::models::Lead;
use vibehunter::sanitizer::{
    format_cnpj, format_phone_number, normalize_domain, normalize_for_comparison, only_digits,
    validate_br_phone,
};

// Property: sanitizer helpers never panic
proptest! {
    #[test]
    fn phone_formatting_never_panics(phone in "\\PC*") {
        let _ = format_phone_number(&phone);
    }

    #[test]
    fn phone_validation_never_panics(phone in "\\PC*") {
        let _ = validate_br_phone(&phone);
    }

    #[test]
    fn domain_normalization_never_panics(domain in "\\PC*") {
        let _ = normalize_domain(&domain);
    }
}

// Property: normalization is idempotent
proptest! {
    #[test]
    fn phone_formatting_is_idempotent(phone in "\\PC*") {
        let once = format_phone_number(&phone);
        prop_assert_eq!(format_phone_number(&once), once);
    }

    #[test]
    fn domain_normalization_is_idempotent(domain in "\\PC*") {
        let once = normalize_domain(&domain);
        prop_assert_eq!(normalize_domain(&once), once);
    }

    #[test]
    fn comparison_key_is_idempotent(value in "\\PC*") {
        let once = normalize_for_comparison(&value);
        prop_assert_eq!(normalize_for_comparison(&once), once);
    }
}

// Property: CNPJ formatting round-trips through the digit form
proptest! {
    #[test]
    fn cnpj_format_round_trips_for_fourteen_digits(digits in "[0-9]{14}") {
        let punctuated = format_cnpj(&digits);
        prop_assert_eq!(only_digits(&punctuated), digits.clone());
        // Re-formatting the punctuated form is stable
        prop_assert_eq!(format_cnpj(&punctuated), punctuated.clone());
    }

    #[test]
    fn cnpj_format_leaves_other_lengths_unchanged(digits in "[0-9]{0,13}") {
        prop_assert_eq!(format_cnpj(&digits), digits);
    }
}

// Property: eleven BR digits always format as +55 mobile
proptest! {
    #[test]
    fn eleven_digit_phones_get_br_prefix(ddd in 11u8..=99u8, number in 900000000u32..=999999999u32) {
        let phone = format!("{}{}", ddd, number);
        let formatted = format_phone_number(&phone);
        prop_assert!(formatted.starts_with("+55 "));
        prop_assert!(formatted.contains('-'));
        prop_assert_eq!(only_digits(&formatted).len(), 13);
    }
}

// Property: dedup counts are consistent and output never grows
proptest! {
    #[test]
    fn dedup_unique_plus_removed_equals_input(
        incoming_emails in proptest::collection::vec(proptest::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"), 0..10),
        baseline_emails in proptest::collection::vec(proptest::option::of("[a-z]{1,8}@[a-z]{1,8}\\.com"), 0..10),
    ) {
        let to_lead = |email: Option<String>| Lead { email, ..Default::default() };
        let incoming: Vec<Lead> = incoming_emails.into_iter().map(to_lead).collect();
        let baseline: Vec<Lead> = baseline_emails.into_iter().map(to_lead).collect();

        let total = incoming.len();
        let result = filter_novel(incoming, &baseline);
        prop_assert_eq!(result.unique.len() + result.removed, total);
    }

    #[test]
    fn dedup_is_insensitive_to_the_order_of_either_collection(
        incoming_emails in proptest::collection::vec(proptest::option::of("[a-c]{1,3}@x\\.com"), 0..10),
        baseline_emails in proptest::collection::vec(proptest::option::of("[a-c]{1,3}@x\\.com"), 0..10),
    ) {
        let to_lead = |email: Option<String>| Lead { email, ..Default::default() };
        let incoming: Vec<Lead> = incoming_emails.into_iter().map(to_lead).collect();
        let baseline: Vec<Lead> = baseline_emails.into_iter().map(to_lead).collect();

        let mut incoming_rev = incoming.clone();
        incoming_rev.reverse();
        let mut baseline_rev = baseline.clone();
        baseline_rev.reverse();

        let forward = filter_novel(incoming, &baseline);
        let reversed = filter_novel(incoming_rev, &baseline_rev);

        prop_assert_eq!(forward.removed, reversed.removed);
        let mut kept_a: Vec<_> = forward.unique.into_iter().map(|l| l.email).collect();
        let mut kept_b: Vec<_> = reversed.unique.into_iter().map(|l| l.email).collect();
        kept_a.sort();
        kept_b.sort();
        prop_assert_eq!(kept_a, kept_b);
    }
}
