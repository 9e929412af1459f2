//! Property tests for destination path resolution.

use proptest::prelude::*;
use skiff::resolve_destination_path;

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._-]{1,12}"
}

fn base() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 0..4).prop_map(|parts| format!("/{}", parts.join("/")))
}

proptest! {
    #[test]
    fn literal_destination_is_untouched(base in base(), name in segment()) {
        prop_assert_eq!(resolve_destination_path(&base, &name, false), base);
    }

    #[test]
    fn directory_destination_ends_with_name(base in base(), name in segment()) {
        let resolved = resolve_destination_path(&base, &name, true);
        let suffix = format!("/{name}");
        prop_assert!(resolved.ends_with(&suffix));
        prop_assert!(resolved.starts_with(&base));
    }

    #[test]
    fn trailing_separator_is_not_doubled(base in base(), name in segment()) {
        let with_slash = format!("{}/", base.trim_end_matches('/'));
        let resolved = resolve_destination_path(&with_slash, &name, true);
        prop_assert!(!resolved.contains("//"));
        prop_assert_eq!(resolved, format!("{with_slash}{name}"));
    }

    #[test]
    fn slash_and_no_slash_agree(base in base(), name in segment()) {
        let trimmed = base.trim_end_matches('/');
        prop_assume!(!trimmed.is_empty());
        prop_assert_eq!(
            resolve_destination_path(trimmed, &name, true),
            resolve_destination_path(&format!("{trimmed}/"), &name, true)
        );
    }
}

#[test]
fn remote_home_relative() {
    assert_eq!(resolve_destination_path("./", "demo.rs", true), "./demo.rs");
}
