use idreg_name::keys::{name_hash, reverse_name};
use idreg_name::{normalize, normalize_name, Params};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[ ]{0,2}[a-zA-Z0-9]{1,12}(-[a-zA-Z0-9]{1,6})?[ ]{0,2}"
}

fn dotted() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..20).prop_map(|segments| segments.join("."))
}

proptest! {
    #[test]
    fn normalize_is_idempotent(name in dotted()) {
        let params = Params::default();
        if let Ok(once) = normalize(&params, &name) {
            let twice = normalize(&params, &once);
            prop_assert_eq!(twice.ok(), Some(once.clone()));
            prop_assert_eq!(normalize_name(&once), once);
        }
    }
}

proptest! {
    #[test]
    fn case_and_padding_do_not_change_the_key(name in dotted()) {
        let params = Params::default();
        let upper = name.to_uppercase();
        match (normalize(&params, &name), normalize(&params, &upper)) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(&a, &b);
                prop_assert_eq!(name_hash(&a), name_hash(&b));
            }
            (a, b) => prop_assert_eq!(a.is_err(), b.is_err()),
        }
    }
}

proptest! {
    #[test]
    fn reversing_twice_is_identity(segments in prop::collection::vec("[a-z]{2,8}", 1..8)) {
        let name = segments.join(".");
        prop_assert_eq!(reverse_name(&reverse_name(&name)), name);
    }
}
