use crate::protocol::daap::{
    BUILTIN_FIELDS, CatalogError, ContentCode, FieldCatalog, FieldDescriptor, ValueKind, codes,
};

#[test]
fn test_builtin_catalog_has_every_row() {
    let catalog = FieldCatalog::builtin();
    assert_eq!(catalog.len(), BUILTIN_FIELDS.len());
    assert!(!catalog.is_empty());
}

#[test]
fn test_builtin_kinds() {
    let catalog = FieldCatalog::builtin();

    let mlit = catalog.lookup(codes::MLIT).unwrap();
    assert!(mlit.is_nested_multi());
    assert!(!mlit.is_leaf());

    let cmst = catalog.lookup(codes::CMST).unwrap();
    assert!(cmst.is_nested_single());

    let minm = catalog.lookup(codes::MINM).unwrap();
    assert!(minm.is_string());
    assert_eq!(minm.name(), Some("dmap.itemname"));

    let canp = catalog.lookup(codes::CANP).unwrap();
    assert!(canp.is_special());
    assert!(canp.is_leaf());

    assert_eq!(catalog.lookup(codes::MPER).unwrap().kind(), ValueKind::U64);
    assert!(catalog.lookup(ContentCode::new(b"zzzz")).is_none());
}

#[test]
fn test_lookup_by_name() {
    let catalog = FieldCatalog::builtin();
    let status = catalog.by_name("dmap.status").unwrap();
    assert_eq!(status.code(), codes::MSTT);
    assert!(catalog.by_name("dmap.nosuchfield").is_none());
}

#[test]
fn test_unnamed_rows_are_addressable_by_code() {
    let catalog = FieldCatalog::builtin();
    let unnamed: Vec<_> = catalog.iter().filter(|d| d.name().is_none()).collect();
    assert!(!unnamed.is_empty());
    for descriptor in unnamed {
        assert_eq!(catalog.lookup(descriptor.code()), Some(descriptor));
    }
}

#[test]
fn test_every_descriptor_has_one_category() {
    for descriptor in FieldCatalog::builtin().iter() {
        let kind = descriptor.kind();
        let categories = [
            descriptor.is_string(),
            descriptor.is_nested_single(),
            descriptor.is_nested_multi(),
            descriptor.is_integer_family(),
            descriptor.is_special(),
            matches!(
                kind,
                ValueKind::Boolean | ValueKind::Date | ValueKind::Version
            ),
        ];
        assert_eq!(
            categories.iter().filter(|c| **c).count(),
            1,
            "{descriptor} is in more or fewer than one category"
        );
        assert_eq!(descriptor.is_leaf(), !kind.is_nested());
    }
}

#[test]
fn test_duplicate_code_is_rejected() {
    let rows = [
        FieldDescriptor::named(b"abcd", "test.first", ValueKind::U8),
        FieldDescriptor::named(b"abcd", "test.second", ValueKind::String),
    ];
    let err = FieldCatalog::from_descriptors(&rows).unwrap_err();
    let CatalogError::DuplicateCode { code, first, second } = err;
    assert_eq!(code, ContentCode::new(b"abcd"));
    assert!(first.contains("test.first"));
    assert!(second.contains("test.second"));
}

#[test]
fn test_content_code_display() {
    assert_eq!(codes::CMST.to_string(), "cmst");
    assert_eq!(ContentCode::from(*b"mlit"), codes::MLIT);
}

#[test]
fn test_natural_widths() {
    assert_eq!(ValueKind::U8.natural_width(), Some(1));
    assert_eq!(ValueKind::I16.natural_width(), Some(2));
    assert_eq!(ValueKind::U32.natural_width(), Some(4));
    assert_eq!(ValueKind::I64.natural_width(), Some(8));
    assert_eq!(ValueKind::String.natural_width(), None);
}
