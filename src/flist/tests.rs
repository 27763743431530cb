// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════
mod flist_tests {
    use std::num::NonZeroUsize;
    use std::rc::Rc;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use crate::catalog::{FieldCatalog, StaticDirectory};
    use crate::error::FlistError;
    use crate::flist;
    use crate::flist::{FlistContext, Record, Value};
    use crate::flist::array::SortOrder;
    use crate::flist_value::FlistValue;
    use crate::poid::Poid;
    use crate::types::ELEMID_ANY;

    fn ctx() -> Rc<FlistContext> {
        let catalog = FieldCatalog::new(StaticDirectory::builtin(), NonZeroUsize::new(256).unwrap());
        FlistContext::new(catalog, 1)
    }

    fn record(data: FlistValue) -> Record {
        Record::from_data(&ctx(), data).unwrap()
    }

    /// A record with a substruct and an array, used by the count tests.
    fn make_nested_record() -> Record {
        record(flist!({
            "PIN_FLD_POID" => "/account",
            "PIN_FLD_INHERITED_INFO" => { "PIN_FLD_RATE_TAG" => "tag" },
            "PIN_FLD_RESULTS" => { 0 => { "PIN_FLD_STATUS" => 1 } },
            "PIN_FLD_USAGE_TYPE" => "usage",
        }))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Scalars
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_set_and_get_scalars() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_STATUS", 2).unwrap();
        r.set("PIN_FLD_NAME", "Alice").unwrap();
        r.set("PIN_FLD_COUNT", 7).unwrap();
        r.set("PIN_FLD_CREATED_T", 1_548_979_200i64).unwrap();
        r.set("PIN_FLD_SELECTOR", vec![1u8, 2, 3]).unwrap();

        assert_eq!(r.get("PIN_FLD_STATUS").unwrap(), Value::Enum(2));
        assert_eq!(r.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("Alice"));
        assert_eq!(r.get_int("PIN_FLD_COUNT").unwrap(), Some(7));
        assert_eq!(r.get_timestamp("PIN_FLD_CREATED_T").unwrap(), Some(1_548_979_200));
        assert_eq!(r.get_bytes("PIN_FLD_SELECTOR").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(r.len(), 5);
    }

    #[test]
    fn test_get_unset_field_names_it() {
        let r = Record::new(&ctx());
        assert_eq!(
            r.get(145u32).unwrap_err(),
            FlistError::FieldNotFound("PIN_FLD_STATUS".into())
        );
        assert_eq!(r.get_or("PIN_FLD_STATUS", Value::Enum(9)).unwrap(), Value::Enum(9));
        assert_eq!(r.get_opt("PIN_FLD_STATUS").unwrap(), None);
        assert!(matches!(
            r.get_opt("PIN_FLD_UNKNOWN"),
            Err(FlistError::FieldNotFound(_))
        ));
    }

    #[test]
    fn test_alias_and_canonical_numbers_share_a_slot() {
        let r = Record::new(&ctx());
        r.set(16u32, "/account").unwrap();
        assert!(r.contains("PIN_FLD_POID").unwrap());
        assert!(r.contains(117_440_528u32).unwrap());
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_typed_getter_checks_the_type() {
        let r = record(flist!({ "PIN_FLD_NAME" => "x" }));
        assert!(r.get_int("PIN_FLD_NAME").unwrap_err().is_type_mismatch());
    }

    #[test]
    fn test_int_from_strings_and_flags() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_COUNT", "42").unwrap();
        assert_eq!(r.get_int("PIN_FLD_COUNT").unwrap(), Some(42));

        r.set("PIN_FLD_FLAGS", "SRCH_EXACT").unwrap();
        assert_eq!(r.get_int("PIN_FLD_FLAGS").unwrap(), Some(512));

        assert_eq!(
            r.set("PIN_FLD_FLAGS", "SRCH_NOPE").unwrap_err(),
            FlistError::UnknownFlag("SRCH_NOPE".into())
        );
        // flag names only apply to the flags field
        assert!(r.set("PIN_FLD_COUNT", "SRCH_EXACT").unwrap_err().is_type_mismatch());
    }

    #[test]
    fn test_int_overflow_is_rejected() {
        let r = Record::new(&ctx());
        let err = r.set("PIN_FLD_COUNT", 1i64 << 40).unwrap_err();
        assert!(matches!(err, FlistError::Overflow { .. }));
        assert!(err.is_type_mismatch());
        assert!(r.set("PIN_FLD_COUNT", "99999999999").unwrap_err().is_type_mismatch());
        assert!(!r.contains("PIN_FLD_COUNT").unwrap());
    }

    #[test]
    fn test_enum_accepts_numeric_strings_only() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_STATUS", "10100").unwrap();
        assert_eq!(r.get_enum("PIN_FLD_STATUS").unwrap(), Some(10100));
        assert!(r.set("PIN_FLD_STATUS", "SRCH_EXACT").unwrap_err().is_type_mismatch());
    }

    #[test]
    fn test_null_scalars_are_present() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_STATUS", FlistValue::Null).unwrap();
        assert!(r.contains("PIN_FLD_STATUS").unwrap());
        assert_eq!(r.get("PIN_FLD_STATUS").unwrap(), Value::Null);
        assert_eq!(r.get_enum("PIN_FLD_STATUS").unwrap(), None);
    }

    #[test]
    fn test_string_coerces_scalars() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_NAME", 12).unwrap();
        assert_eq!(r.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("12"));
    }

    #[test]
    fn test_decimal_inputs() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_AMOUNT", "10.25").unwrap();
        assert_eq!(r.get_decimal("PIN_FLD_AMOUNT").unwrap().as_deref(), Some("10.25"));
        r.set("PIN_FLD_AMOUNT", 3).unwrap();
        assert_eq!(r.get_decimal("PIN_FLD_AMOUNT").unwrap().as_deref(), Some("3"));
        r.set("PIN_FLD_AMOUNT", 1.5).unwrap();
        assert_eq!(r.get_decimal("PIN_FLD_AMOUNT").unwrap().as_deref(), Some("1.5"));

        assert!(matches!(
            r.set("PIN_FLD_AMOUNT", "ten"),
            Err(FlistError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_timestamp_inputs() {
        let r = Record::new(&ctx());
        let when = Utc.with_ymd_and_hms(2019, 2, 1, 0, 0, 0).unwrap();
        r.set("PIN_FLD_END_T", when).unwrap();
        assert_eq!(r.get_timestamp("PIN_FLD_END_T").unwrap(), Some(1_548_979_200));

        r.set("PIN_FLD_END_T", "2019-02-01T00:00:00Z").unwrap();
        assert_eq!(r.get_timestamp("PIN_FLD_END_T").unwrap(), Some(1_548_979_200));

        r.set("PIN_FLD_END_T", 12.9).unwrap();
        assert_eq!(r.get_timestamp("PIN_FLD_END_T").unwrap(), Some(12));

        assert!(matches!(
            r.set("PIN_FLD_END_T", "yesterday"),
            Err(FlistError::InvalidValue(_))
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // POIDs
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_poid_type_only_uses_session_database() {
        let ctx = ctx();
        ctx.set_database(3);
        let r = Record::new(&ctx);
        r.set("PIN_FLD_POID", "/account").unwrap();
        let poid = r.get_poid("PIN_FLD_POID").unwrap().unwrap();
        assert_eq!(poid.to_string(), "0.0.0.3 /account -1 0");
        assert!(poid.is_type_only());
    }

    #[test]
    fn test_poid_positional_parts() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_POID", ("/account", 5)).unwrap();
        assert_eq!(
            r.get_poid("PIN_FLD_POID").unwrap().unwrap(),
            Poid::new(1, "/account", 5, 0).unwrap()
        );

        r.set("PIN_FLD_POID", ("/account", 5, 2, 7)).unwrap();
        assert_eq!(r.get_poid("PIN_FLD_POID").unwrap().unwrap().to_string(), "0.0.0.7 /account 5 2");

        let too_many = FlistValue::Tuple(vec!["/a".into(), 1.into(), 2.into(), 3.into(), 4.into()]);
        assert!(matches!(
            r.set("PIN_FLD_POID", too_many),
            Err(FlistError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_poid_from_canonical_string() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_POID", "0.0.0.1 /service/ip 42 3").unwrap();
        let poid = r.get_poid("PIN_FLD_POID").unwrap().unwrap();
        assert_eq!((poid.id, poid.revision), (42, 3));

        assert!(matches!(
            r.set("PIN_FLD_POID", "0.0.0.1 /account"),
            Err(FlistError::InvalidValue(_))
        ));
        assert!(matches!(
            r.set("PIN_FLD_POID", "1account"),
            Err(FlistError::InvalidValue(_))
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Substructs and child identity
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_structure_conflicts() {
        let r = Record::new(&ctx());
        assert!(matches!(
            r.set("PIN_FLD_INHERITED_INFO", 5),
            Err(FlistError::StructureConflict { .. })
        ));
        assert!(matches!(
            r.set("PIN_FLD_RESULTS", "x"),
            Err(FlistError::StructureConflict { .. })
        ));
        assert!(matches!(
            r.set("PIN_FLD_NAME", flist!({ "PIN_FLD_STATUS" => 1 })),
            Err(FlistError::StructureConflict { .. })
        ));
    }

    #[test]
    fn test_null_substruct() {
        let r = record(flist!({ "PIN_FLD_POID" => "/account", "PIN_FLD_INHERITED_INFO" => null }));
        assert!(r.contains("PIN_FLD_INHERITED_INFO").unwrap());
        assert_eq!(r.get_flist("PIN_FLD_INHERITED_INFO").unwrap(), None);
        assert_eq!(r.count(false), 2);
        assert_eq!(r.count(true), 2);
    }

    #[test]
    fn test_child_views_are_identical() {
        let r = make_nested_record();
        let a = r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        let b = r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        assert!(a.same_node(&b));

        a.set("PIN_FLD_RATE_TAG", "changed").unwrap();
        assert_eq!(b.get_str("PIN_FLD_RATE_TAG").unwrap().as_deref(), Some("changed"));
    }

    #[test]
    fn test_overwrite_keeps_old_view() {
        let r = make_nested_record();
        let old = r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        r.set("PIN_FLD_INHERITED_INFO", flist!({ "PIN_FLD_RATE_TAG" => "new" })).unwrap();

        assert_eq!(old.get_str("PIN_FLD_RATE_TAG").unwrap().as_deref(), Some("tag"));
        let new = r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        assert!(!new.same_node(&old));
        assert_eq!(new.get_str("PIN_FLD_RATE_TAG").unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn test_child_outlives_parent() {
        let child = {
            let r = make_nested_record();
            r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap()
        };
        assert_eq!(child.get_str("PIN_FLD_RATE_TAG").unwrap().as_deref(), Some("tag"));
    }

    #[test]
    fn test_set_flist_copies_the_source() {
        let r = Record::new(&ctx());
        let z = record(flist!({ "PIN_FLD_RATE_TAG" => "z" }));
        r.set_flist("PIN_FLD_INHERITED_INFO", Some(&z)).unwrap();
        z.set("PIN_FLD_RATE_TAG", "mutated").unwrap();

        let stored = r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        assert_eq!(stored.get_str("PIN_FLD_RATE_TAG").unwrap().as_deref(), Some("z"));
        assert!(!stored.same_node(&z));
    }

    #[test]
    fn test_set_flist_from_itself() {
        let r = record(flist!({ "PIN_FLD_NAME" => "self" }));
        r.set_flist("PIN_FLD_INHERITED_INFO", Some(&r)).unwrap();
        let inner = r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        assert_eq!(inner.keys(), vec!["PIN_FLD_NAME"]);
    }

    #[test]
    fn test_construct_from_names() {
        let r = record(FlistValue::names(["PIN_FLD_POID", "PIN_FLD_STATUS", "PIN_FLD_RESULTS"]));
        assert_eq!(r.get("PIN_FLD_POID").unwrap(), Value::Null);
        assert_eq!(r.get("PIN_FLD_STATUS").unwrap(), Value::Null);
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        assert_eq!(results.keys(), vec![0]);
        assert_eq!(results.get(0).unwrap(), None);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Arrays
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_get_array_error_names_the_field() {
        let r = record(flist!({ "PIN_FLD_POID" => "/account" }));
        // 16 is a legacy alias of PIN_FLD_POID.
        match r.get_array(16u32).unwrap_err() {
            FlistError::TypeMismatch { field, expected, .. } => {
                assert_eq!(field, "PIN_FLD_POID");
                assert_eq!(expected, crate::types::FieldType::Array);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let results = r.get_array(r.resolve("PIN_FLD_RESULTS").unwrap().number).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_array_from_list_numbers_from_zero() {
        let r = record(flist!({
            "PIN_FLD_RESULTS" => [ { "PIN_FLD_STATUS" => 0 }, { "PIN_FLD_STATUS" => 1 } ],
        }));
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        assert_eq!(results.keys(), vec![0, 1]);
        let second = results.get(1).unwrap().unwrap();
        assert_eq!(second.get_enum("PIN_FLD_STATUS").unwrap(), Some(1));
    }

    #[test]
    fn test_missing_element() {
        let r = record(flist!({ "PIN_FLD_RESULTS" => { 3 => {} } }));
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        assert_eq!(
            results.get(4).unwrap_err(),
            FlistError::ElementNotFound {
                field: "PIN_FLD_RESULTS".into(),
                elem_id: 4
            }
        );
        assert_eq!(results.get_or(4, None).unwrap(), None);
        assert!(results.delete(4).unwrap_err().is_not_found());
    }

    #[test]
    fn test_wildcard_falls_back_to_first_element() {
        let r = record(flist!({
            "PIN_FLD_RESULTS" => { 10 => { "PIN_FLD_NAME" => "ten" }, 11 => {} },
        }));
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        let any = results.get("*").unwrap().unwrap();
        let ten = results.get(10).unwrap().unwrap();
        assert!(any.same_node(&ten));
        assert!(results.get("PIN_ELEMID_ANY").unwrap().unwrap().same_node(&ten));
        assert!(results.contains("*").unwrap());
    }

    #[test]
    fn test_overwrite_any_element() {
        let r = record(flist!({ "PIN_FLD_RESULTS" => { 10 => { "PIN_FLD_NAME" => "a" } } }));
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        let a = results.get(10).unwrap().unwrap();

        results.set_value("*", flist!({ "PIN_FLD_NAME" => "b" })).unwrap();
        let any = results.get(ELEMID_ANY).unwrap().unwrap();
        assert_eq!(any.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("b"));
        assert_eq!(a.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("a"));

        results.set_value(-1, flist!({ "PIN_FLD_NAME" => "c" })).unwrap();
        assert_eq!(any.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("b"));
        assert!(results.has_wildcard());
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_bulk_set_collapses_wildcards() {
        let r = Record::new(&ctx());
        r.set(
            "PIN_FLD_RESULTS",
            flist!({
                0 => { "PIN_FLD_NAME" => "A" },
                "*" => { "PIN_FLD_NAME" => "W" },
                (-1) => { "PIN_FLD_NAME" => "B" },
            }),
        )
        .unwrap();

        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        assert_eq!(results.keys(), vec![ELEMID_ANY, 0]);
        let wildcard = results.get("*").unwrap().unwrap();
        assert_eq!(wildcard.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("B"));
        let zero = results.get(0).unwrap().unwrap();
        assert_eq!(zero.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("A"));
    }

    #[test]
    fn test_digit_string_keys_are_elem_ids() {
        let r = record(flist!({ "PIN_FLD_RESULTS" => { "7" => {} } }));
        assert_eq!(r.get_array("PIN_FLD_RESULTS").unwrap().keys(), vec![7]);
        assert!(matches!(
            Record::from_data(&ctx(), flist!({ "PIN_FLD_RESULTS" => { "seven" => {} } })),
            Err(FlistError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_deleting_last_element_leaves_virtual_array() {
        let r = record(flist!({
            "PIN_FLD_POID" => "/account",
            "PIN_FLD_RESULTS" => { 0 => { "PIN_FLD_STATUS" => 1 } },
        }));
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        results.delete(0).unwrap();

        assert!(r.contains("PIN_FLD_RESULTS").unwrap());
        assert_eq!(results.len(), 0);
        assert!(r.get("PIN_FLD_RESULTS").is_ok());
        assert_eq!(r.len(), 1);
        assert_eq!(r.keys(), vec!["PIN_FLD_POID"]);

        results.set_value(5, flist!({})).unwrap();
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_empty_mapping_makes_virtual_array() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_RESULTS", FlistValue::object()).unwrap();
        assert!(r.contains("PIN_FLD_RESULTS").unwrap());
        assert_eq!(r.len(), 0);
        assert_eq!(r.count(true), 0);

        r.delete("PIN_FLD_RESULTS").unwrap();
        assert!(!r.contains("PIN_FLD_RESULTS").unwrap());
        assert!(r.delete("PIN_FLD_RESULTS").unwrap_err().is_not_found());
    }

    #[test]
    fn test_null_array_is_single_null_element() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_RESULTS", FlistValue::Null).unwrap();
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        assert_eq!(results.keys(), vec![0]);
        assert_eq!(results.get(0).unwrap(), None);
    }

    #[test]
    fn test_array_truthiness() {
        let r = Record::new(&ctx());
        r.set("PIN_FLD_RESULTS", FlistValue::object()).unwrap();
        assert!(!r.get_array("PIN_FLD_RESULTS").unwrap().is_truthy());

        r.set("PIN_FLD_RESULTS", FlistValue::Null).unwrap();
        assert!(!r.get_array("PIN_FLD_RESULTS").unwrap().is_truthy());

        r.set("PIN_FLD_RESULTS", flist!({ 0 => null, 1 => null })).unwrap();
        assert!(r.get_array("PIN_FLD_RESULTS").unwrap().is_truthy());

        r.set("PIN_FLD_RESULTS", flist!({ 4 => {} })).unwrap();
        assert!(r.get_array("PIN_FLD_RESULTS").unwrap().is_truthy());
    }

    #[test]
    fn test_array_pop_and_clear() {
        let r = record(flist!({ "PIN_FLD_RESULTS" => { 0 => { "PIN_FLD_NAME" => "x" }, 1 => null } }));
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        let popped = results.pop(0).unwrap().unwrap();
        assert_eq!(popped.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("x"));
        assert_eq!(results.pop(1).unwrap(), None);
        assert!(results.is_empty());

        results.set_value(2, flist!({})).unwrap();
        results.clear();
        assert!(r.contains("PIN_FLD_RESULTS").unwrap());
        assert!(results.is_empty());
    }

    #[test]
    fn test_array_count() {
        let r = record(flist!({
            "PIN_FLD_RESULTS" => {
                0 => { "PIN_FLD_STATUS" => 1, "PIN_FLD_NAME" => "a" },
                1 => null,
            },
        }));
        let results = r.get_array("PIN_FLD_RESULTS").unwrap();
        assert_eq!(results.count(false), 2);
        assert_eq!(results.count(true), 3);
    }

    #[test]
    fn test_sort_by_key() {
        let r = record(flist!({
            "PIN_FLD_RESULTS" => {
                0 => { "PIN_FLD_NAME" => "b" },
                1 => { "PIN_FLD_NAME" => "a" },
                2 => { "PIN_FLD_NAME" => "c" },
            },
        }));
        r.sort("PIN_FLD_RESULTS", &["PIN_FLD_NAME"], SortOrder::Ascending).unwrap();
        assert_eq!(r.get_array("PIN_FLD_RESULTS").unwrap().keys(), vec![1, 0, 2]);

        r.sort_reverse("PIN_FLD_RESULTS", &["PIN_FLD_NAME"]).unwrap();
        assert_eq!(r.get_array("PIN_FLD_RESULTS").unwrap().keys(), vec![2, 0, 1]);

        assert!(matches!(
            r.sort("PIN_FLD_RESULTS", &[], SortOrder::Ascending),
            Err(FlistError::InvalidValue(_))
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Count, copy, update
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_count() {
        let r = make_nested_record();
        assert_eq!(r.count(false), 4);
        assert_eq!(r.count(true), 6);

        r.get_array("PIN_FLD_RESULTS").unwrap().set(1, None).unwrap();
        assert_eq!(r.count(true), 7);

        r.set("PIN_FLD_ARGS", FlistValue::Null).unwrap();
        assert_eq!(r.count(false), 5);
        assert_eq!(r.count(true), 9);
    }

    #[test]
    fn test_copy_is_independent() {
        let r = make_nested_record();
        let c = r.copy();
        assert_eq!(c, r);
        assert!(!c.same_node(&r));

        c.get_flist("PIN_FLD_INHERITED_INFO")
            .unwrap()
            .unwrap()
            .set("PIN_FLD_RATE_TAG", "copy")
            .unwrap();
        assert_ne!(c, r);
        let original = r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        assert_eq!(original.get_str("PIN_FLD_RATE_TAG").unwrap().as_deref(), Some("tag"));
    }

    #[test]
    fn test_update_merges_recursively() {
        let r = record(flist!({
            "PIN_FLD_POID" => "/account",
            "PIN_FLD_INHERITED_INFO" => { "PIN_FLD_RATE_TAG" => "tag", "PIN_FLD_NAME" => "n" },
            "PIN_FLD_RESULTS" => { 0 => { "PIN_FLD_STATUS" => 0 }, 1 => {} },
        }));
        r.update_from(flist!({
            "PIN_FLD_POID" => "/service",
            "PIN_FLD_INHERITED_INFO" => { "PIN_FLD_RATE_TAG" => "new" },
            "PIN_FLD_RESULTS" => { 0 => { "PIN_FLD_STATUS" => 10 }, 2 => null },
            "PIN_FLD_STATUS" => 1,
        }))
        .unwrap();

        let expected = record(flist!({
            "PIN_FLD_POID" => "/service",
            "PIN_FLD_INHERITED_INFO" => { "PIN_FLD_RATE_TAG" => "new", "PIN_FLD_NAME" => "n" },
            "PIN_FLD_RESULTS" => { 0 => { "PIN_FLD_STATUS" => 10 }, 1 => {}, 2 => null },
            "PIN_FLD_STATUS" => 1,
        }));
        assert_eq!(r, expected);
        assert_eq!(r.count(false), 4);
    }

    #[test]
    fn test_update_overwrites_null_substruct() {
        let r = record(flist!({ "PIN_FLD_INHERITED_INFO" => null }));
        r.update_from(flist!({ "PIN_FLD_INHERITED_INFO" => { "PIN_FLD_NAME" => "x" } }))
            .unwrap();
        let info = r.get_flist("PIN_FLD_INHERITED_INFO").unwrap().unwrap();
        assert_eq!(info.get_str("PIN_FLD_NAME").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_add_leaves_operands_alone() {
        let a = record(flist!({ "PIN_FLD_POID" => "/account", "PIN_FLD_STATUS" => 1 }));
        let b = record(flist!({ "PIN_FLD_NAME" => "x", "PIN_FLD_RESULTS" => { 0 => {} } }));
        let sum = a.add(&b).unwrap();

        assert_eq!(sum.count(false), a.count(false) + b.count(false));
        assert_eq!(a.keys(), vec!["PIN_FLD_POID", "PIN_FLD_STATUS"]);
        assert_eq!(b.keys(), vec!["PIN_FLD_NAME", "PIN_FLD_RESULTS"]);
    }

    #[test]
    fn test_add_with_shared_fields_does_not_duplicate() {
        let a = record(flist!({ "PIN_FLD_POID" => "/account", "PIN_FLD_STATUS" => 1 }));
        let b = record(flist!({ "PIN_FLD_STATUS" => 2 }));
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.count(false), 2);
        assert_eq!(sum.get_enum("PIN_FLD_STATUS").unwrap(), Some(2));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Iteration and equality
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_delete_during_iteration() {
        let r = record(flist!({
            "PIN_FLD_POID" => "/account",
            "PIN_FLD_STATUS" => 1,
            "PIN_FLD_NAME" => "x",
        }));
        let mut seen = Vec::new();
        for (desc, _) in &r {
            if desc.name == "PIN_FLD_POID" {
                r.delete("PIN_FLD_STATUS").unwrap();
            }
            seen.push(desc.name);
        }
        assert_eq!(seen, vec!["PIN_FLD_POID", "PIN_FLD_NAME"]);
    }

    #[test]
    fn test_delete_keeps_remaining_order() {
        let r = record(flist!({
            "PIN_FLD_POID" => "/account",
            "PIN_FLD_STATUS" => 1,
            "PIN_FLD_NAME" => "x",
        }));
        r.delete("PIN_FLD_POID").unwrap();
        r.set("PIN_FLD_POID", "/account").unwrap();
        assert_eq!(r.keys(), vec!["PIN_FLD_STATUS", "PIN_FLD_NAME", "PIN_FLD_POID"]);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = record(flist!({ "PIN_FLD_STATUS" => 1, "PIN_FLD_NAME" => "x" }));
        let b = record(flist!({ "PIN_FLD_NAME" => "x", "PIN_FLD_STATUS" => 1 }));
        assert_eq!(a, b);
        b.set("PIN_FLD_STATUS", 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_pop_and_clear() {
        let r = make_nested_record();
        let info = r.pop("PIN_FLD_INHERITED_INFO").unwrap();
        assert_eq!(
            info.as_flist().unwrap().get_str("PIN_FLD_RATE_TAG").unwrap().as_deref(),
            Some("tag")
        );
        let results = r.pop("PIN_FLD_RESULTS").unwrap();
        assert_eq!(results.as_array().unwrap().keys(), vec![0]);
        assert!(!r.contains("PIN_FLD_RESULTS").unwrap());

        r.clear();
        assert!(r.is_empty());
    }

    #[test]
    fn test_asdict_is_detached() {
        fn assert_send<T: Send>(_: &T) {}

        let r = make_nested_record();
        let dict = r.asdict();
        assert_send(&dict);
        r.set("PIN_FLD_USAGE_TYPE", "changed").unwrap();

        assert_eq!(dict.get("PIN_FLD_USAGE_TYPE"), Some(&FlistValue::from("usage")));
        let results = dict.get("PIN_FLD_RESULTS").unwrap();
        assert_eq!(
            results.get(0).and_then(|e| e.get("PIN_FLD_STATUS")),
            Some(&FlistValue::Int(1))
        );
        assert_eq!(Record::from_data(&ctx(), dict).unwrap(), make_nested_record());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Properties
    // ═══════════════════════════════════════════════════════════════════════

    const INT_FIELDS: [&str; 4] = ["PIN_FLD_FLAGS", "PIN_FLD_COUNT", "PIN_FLD_STATUS", "PIN_FLD_TYPE"];
    const STR_FIELDS: [&str; 4] = ["PIN_FLD_NAME", "PIN_FLD_DESCR", "PIN_FLD_LOGIN", "PIN_FLD_TEMPLATE"];

    fn build(fields: &[&str], values: Vec<(usize, FlistValue)>) -> Record {
        let r = Record::new(&ctx());
        for (i, value) in values {
            r.set(fields[i % fields.len()], value).unwrap();
        }
        r
    }

    proptest! {
        #[test]
        fn copy_equals_original(ints in prop::collection::vec((0usize..4, any::<i32>()), 0..8)) {
            let r = build(&INT_FIELDS, ints.into_iter().map(|(i, v)| (i, FlistValue::from(v))).collect());
            let c = r.copy();
            prop_assert_eq!(&c, &r);
            c.set("PIN_FLD_NAME", "only in copy").unwrap();
            prop_assert!(!r.contains("PIN_FLD_NAME").unwrap());
        }

        #[test]
        fn add_counts_are_additive(
            ints in prop::collection::vec((0usize..4, any::<i32>()), 0..8),
            strs in prop::collection::vec((0usize..4, "[a-z]{0,8}"), 0..8),
        ) {
            let a = build(&INT_FIELDS, ints.into_iter().map(|(i, v)| (i, FlistValue::from(v))).collect());
            let b = build(&STR_FIELDS, strs.into_iter().map(|(i, v)| (i, FlistValue::from(v))).collect());
            let (ca, cb) = (a.count(false), b.count(false));
            let sum = a.add(&b).unwrap();
            prop_assert_eq!(sum.count(false), ca + cb);
            prop_assert_eq!(a.count(false), ca);
            prop_assert_eq!(b.count(false), cb);
        }
    }
}
