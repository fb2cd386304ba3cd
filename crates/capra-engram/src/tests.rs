//! Unit tests for column memory and payload codecs.

#[cfg(test)]
mod payload {
    use crate::{EngramError, TensorPayload};

    #[test]
    fn bytes_roundtrip_preserves_shape_and_data() {
        let t = TensorPayload {
            data: vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
            shape: vec![2, 3],
            kind: "scene".into(),
            fmt: "tensor/list-f32".into(),
        };
        let back = TensorPayload::from_bytes(&t.to_bytes()).unwrap();
        assert_eq!(back.data, t.data);
        assert_eq!(back.shape, t.shape);
    }

    #[test]
    fn bad_magic_rejected() {
        let err = TensorPayload::from_bytes(b"NOPE\x00rest").unwrap_err();
        assert!(matches!(err, EngramError::BadMagic));
    }

    #[test]
    fn bad_version_rejected() {
        let mut bytes = TensorPayload::vector(vec![1.0], "scene").to_bytes();
        bytes[5] = 9; // version field, little-endian low byte
        let err = TensorPayload::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, EngramError::BadVersion(9)));
    }

    #[test]
    fn truncated_header_rejected() {
        let bytes = TensorPayload::vector(vec![1.0, 2.0], "scene").to_bytes();
        let err = TensorPayload::from_bytes(&bytes[..7]).unwrap_err();
        assert!(matches!(err, EngramError::Truncated { .. }));
    }

    #[test]
    fn vector_helper_sets_1d_shape() {
        let t = TensorPayload::vector(vec![1.0, 2.0, 3.0], "scene");
        assert_eq!(t.shape, vec![3]);
        assert_eq!(t.kind, "scene");
    }
}

#[cfg(test)]
mod store {
    use serde_json::{json, Value};

    use crate::{ColumnMemory, FactMeta, FindQuery};

    fn column() -> ColumnMemory {
        ColumnMemory::new("column01", 42)
    }

    #[test]
    fn assert_and_get() {
        let mut col = column();
        let id = col.assert_fact("scene:vision", json!({"data": [0.1, 0.2]}), None);
        let rec = col.get(id).unwrap();
        assert_eq!(rec.name, "scene:vision");
        assert_eq!(rec.meta.attrs.get("column"), Some(&Value::String("column01".into())));
        assert_eq!(rec.meta.created_at.len(), 19); // YYYY-MM-DDThh:mm:ss
    }

    #[test]
    fn get_missing_is_an_error() {
        let col = column();
        let mut other = ColumnMemory::new("other", 7);
        let id = other.assert_fact("x", Value::Null, None);
        assert!(col.get(id).is_err());
        assert!(col.try_get(id).is_none());
        assert!(!col.exists(id));
    }

    #[test]
    fn delete_and_count() {
        let mut col = column();
        let a = col.assert_fact("a", Value::Null, None);
        let _b = col.assert_fact("b", Value::Null, None);
        assert_eq!(col.count(), 2);
        assert!(col.delete(a));
        assert!(!col.delete(a));
        assert_eq!(col.count(), 1);
    }

    #[test]
    fn list_ids_is_sorted() {
        let mut col = column();
        for i in 0..8 {
            col.assert_fact(&format!("rec{i}"), Value::Null, None);
        }
        let ids = col.list_ids();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn find_filters_compose() {
        let mut col = column();
        col.assert_fact(
            "wm:mapsurface",
            Value::Null,
            Some(FactMeta::named("wm:mapsurface").with_attr("epoch_vhash64", json!("deadbeef00000000"))),
        );
        col.assert_fact("wm:mapsurface", Value::Null, None);
        col.assert_fact(
            "scene:vision",
            Value::Null,
            Some(FactMeta::named("scene:vision").with_attr("ticks", json!(4))),
        );

        assert_eq!(col.find(&FindQuery { name_contains: Some("mapsurface"), ..Default::default() }).len(), 2);
        assert_eq!(col.find(&FindQuery { epoch: Some("deadbeef00000000"), ..Default::default() }).len(), 1);
        assert_eq!(col.find(&FindQuery { has_attr: Some("ticks"), ..Default::default() }).len(), 1);
        assert_eq!(col.find(&FindQuery::default()).len(), 3);
    }

    #[test]
    fn ids_are_reproducible_per_seed() {
        let mut a = ColumnMemory::new("column01", 5);
        let mut b = ColumnMemory::new("column01", 5);
        assert_eq!(
            a.assert_fact("x", Value::Null, None),
            b.assert_fact("x", Value::Null, None)
        );
    }
}
